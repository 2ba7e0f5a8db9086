//! Terminal presentation of a round and the directional answer prompt.

use std::fmt::Write;

use anyhow::Result;
use dialoguer::Input;

use pentagon_proto::{AuthRound, Color, Direction};

/// The challenge sequence, then one line per color listing the characters
/// shown in it, e.g.
///
/// ```text
/// Round 2 (sequence length 2)
///   Sequence 7 Q
///   Red     0 4 9 B ...
/// ```
pub fn render_round(round: &AuthRound) -> String {
    let assignment = &round.color_assignment;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Round {} (sequence length {})",
        round.current_round + 1,
        assignment.round
    );
    let sequence: Vec<String> = assignment
        .challenge_sequence()
        .chars()
        .map(String::from)
        .collect();
    let _ = writeln!(out, "  Sequence {}", sequence.join(" "));
    for color in Color::ALL {
        let chars: Vec<String> = assignment
            .characters_in(color)
            .into_iter()
            .map(String::from)
            .collect();
        let _ = writeln!(out, "  {:<7} {}", color.name(), chars.join(" "));
    }
    out
}

/// Ask for one direction. Accepts `u/d/l/r` or the full words.
pub fn prompt_direction() -> Result<Direction> {
    let input: String = Input::new()
        .with_prompt("Direction of your next character's color")
        .validate_with(|s: &String| -> Result<(), String> {
            parse_direction(s).map(|_| ()).ok_or_else(|| "enter u, d, l or r".into())
        })
        .interact_text()?;
    parse_direction(&input).ok_or_else(|| anyhow::anyhow!("invalid direction {input:?}"))
}

fn parse_direction(input: &str) -> Option<Direction> {
    input.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use pentagon_proto::secret::ALPHABET;
    use pentagon_proto::{ColorAssignment, ProverState};

    fn round(required: u32) -> AuthRound {
        let color_mapping: BTreeMap<char, Color> = ALPHABET
            .chars()
            .enumerate()
            .map(|(i, c)| (c, Color::ALL[i / 10]))
            .collect();
        AuthRound {
            color_assignment: ColorAssignment {
                color_mapping,
                offset: 3,
                rotated_alphabet: ALPHABET.to_string(),
                round: required,
            },
            current_round: 1,
            prover_state: ProverState::default(),
        }
    }

    #[test]
    fn lists_characters_per_color() {
        let text = render_round(&round(5));
        assert!(text.starts_with("Round 2 (sequence length 5)"));
        assert!(text.contains("  Sequence 0 1 2 3 4\n"));
        assert!(text.contains("Red     0 1 2 3 4 5 6 7 8 9"));
        assert!(text.contains("Yellow  U V W X Y Z ! # $ @"));
    }

    #[test]
    fn accepts_codes_and_words() {
        assert_eq!(parse_direction("u"), Some(Direction::Up));
        assert_eq!(parse_direction(" Left "), Some(Direction::Left));
        assert_eq!(parse_direction("D"), Some(Direction::Down));
        assert_eq!(parse_direction("w"), None);
        assert_eq!(parse_direction("x"), None);
        assert_eq!(parse_direction(""), None);
    }
}
