//! Per-session round generation and answer checking.
//!
//! A session runs one round per secret character. Each round shows a fresh,
//! balanced character → color mapping; the prover answers with the direction
//! its legend binds to the color of its next secret character. Correctness is
//! only revealed after the last round.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use tracing::debug;

use pentagon_proto::secret::ALPHABET;
use pentagon_proto::{
    AuthRound, Color, ColorAssignment, Direction, Legend, ProverState, RoundSolution, Secret,
};

use crate::primes;
use crate::registry::OpenedCredential;

const ROOT_DOMAIN: &[u8] = b"pentagon-root-v1";
const ROUND_DOMAIN: &[u8] = b"pentagon-round-v1";

pub const VERIFIED_MESSAGE: &str = "verified";
pub const INCORRECT_MESSAGE: &str = "incorrect sequence";

/// Characters shown in each color per round.
const PER_COLOR: usize = 10;

/// Generate a 32-byte random nonce.
pub fn generate_nonce() -> [u8; 32] {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Shuffle the alphabet and hand out [`PER_COLOR`] characters to each color.
pub fn balanced_mapping(rng: &mut impl Rng) -> BTreeMap<char, Color> {
    let mut chars: Vec<char> = ALPHABET.chars().collect();
    chars.shuffle(rng);
    chars
        .chunks(PER_COLOR)
        .zip(Color::ALL)
        .flat_map(|(chunk, color)| chunk.iter().map(move |c| (*c, color)))
        .collect()
}

/// Rotate the alphabet right by `offset` positions.
pub fn rotate_alphabet(offset: usize) -> String {
    let chars: Vec<char> = ALPHABET.chars().collect();
    let split = chars.len() - offset % chars.len();
    chars[split..].iter().chain(&chars[..split]).collect()
}

/// One authentication session bound to one connection.
pub struct ChallengeSession {
    secret: Secret,
    legend: Legend,
    /// Index of the secret character the current round asks about.
    position: usize,
    all_correct: bool,
    current: AuthRound,
    finished: bool,
}

impl ChallengeSession {
    /// Fix the prover state identifiers and generate round 0.
    pub fn start(credential: OpenedCredential) -> Self {
        let nonce = generate_nonce();
        let root = Sha256::new()
            .chain_update(ROOT_DOMAIN)
            .chain_update(nonce)
            .chain_update(credential.public_key.as_bytes())
            .finalize();

        let prover_state = ProverState {
            commitments: Vec::new(),
            entropy_layers: Vec::new(),
            eth_address: credential.address,
            holy_primes: Vec::new(),
            nonce: hex::encode(nonce),
            public_key: credential.public_key,
            root_commitment: hex::encode(root),
        };

        let mut session = Self {
            secret: credential.secret,
            legend: credential.legend,
            position: 0,
            all_correct: true,
            current: AuthRound {
                color_assignment: ColorAssignment {
                    color_mapping: BTreeMap::new(),
                    offset: 0,
                    rotated_alphabet: String::new(),
                    round: 0,
                },
                current_round: 0,
                prover_state,
            },
            finished: false,
        };
        session.advance();
        session
    }

    /// The round awaiting an answer, or `None` once the session has ended.
    pub fn current_round(&self) -> Option<&AuthRound> {
        (!self.finished).then_some(&self.current)
    }

    pub fn total_rounds(&self) -> usize {
        self.secret.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Record one answer. Returns a terminal solution after the last round,
    /// otherwise an incomplete one with the next round already prepared.
    pub fn solve(&mut self, answer: Direction) -> RoundSolution {
        if self.finished {
            return RoundSolution::terminal(false, INCORRECT_MESSAGE);
        }

        let expected = self
            .secret
            .char_at(self.position)
            .and_then(|c| pentagon_proto::answer_for(&self.current.color_assignment, c, &self.legend));
        if expected != Some(answer) {
            self.all_correct = false;
        }
        debug!(position = self.position, "answer recorded");

        self.position += 1;
        if self.position >= self.secret.len() {
            self.finished = true;
            return if self.all_correct {
                RoundSolution::terminal(true, VERIFIED_MESSAGE)
            } else {
                RoundSolution::terminal(false, INCORRECT_MESSAGE)
            };
        }

        self.advance();
        RoundSolution::incomplete()
    }

    /// Generate the round for `self.position` and extend the prover state.
    fn advance(&mut self) {
        let mut rng = rand::thread_rng();
        let offset = rng.gen_range(1..=ALPHABET.len());
        let assignment = ColorAssignment {
            color_mapping: balanced_mapping(&mut rng),
            offset: offset as i64,
            rotated_alphabet: rotate_alphabet(offset),
            round: self.position as u32 + 1,
        };

        let entropy: u64 = rng.gen();
        let state = &mut self.current.prover_state;
        let commitment = Sha256::new()
            .chain_update(ROUND_DOMAIN)
            .chain_update(state.root_commitment.as_bytes())
            .chain_update((self.position as u64).to_be_bytes())
            .chain_update(assignment.rotated_alphabet.as_bytes())
            .chain_update(entropy.to_be_bytes())
            .finalize();
        state.commitments.push(hex::encode(commitment));
        state.entropy_layers.push(entropy);
        state.holy_primes.push(primes::search(&mut rng));

        self.current.color_assignment = assignment;
        self.current.current_round = self.position as u32;
    }
}
