use diffuzz_core::{Error, Result, TestGenerator};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Opcodes drawn more often than uniformly random bytes: stack
/// manipulation, arithmetic, memory, control flow and halting.
const INTERESTING_OPCODES: &[u8] = &[
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x0a, 0x10, 0x11, 0x14, 0x15, 0x16, 0x17, 0x19,
    0x1b, 0x1c, 0x20, 0x35, 0x36, 0x50, 0x51, 0x52, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59,
    0x5a, 0x5b, 0x5f, 0x60, 0x61, 0x80, 0x81, 0x90, 0x91, 0xf3, 0xfd, 0xfe,
];

/// One randomly generated program together with its execution environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RandomCodeTest {
    pub name: String,
    /// Hex encoded bytecode, `0x` prefixed
    pub code: String,
    /// Hex encoded input data, `0x` prefixed
    pub calldata: String,
    pub gas: u64,
    pub value: u64,
}

/// Generates random bytecode programs
#[derive(Debug, Clone)]
pub struct RandomCodeGenerator {
    min_code_len: usize,
    max_code_len: usize,
    gas: u64,
}

impl RandomCodeGenerator {
    pub fn new(min_code_len: usize, max_code_len: usize, gas: u64) -> Result<Self> {
        if min_code_len > max_code_len {
            return Err(Error::configuration(format!(
                "minimum code length {} exceeds maximum {}",
                min_code_len, max_code_len
            )));
        }
        Ok(Self {
            min_code_len,
            max_code_len,
            gas,
        })
    }

    fn random_code<R: Rng>(&self, rng: &mut R) -> Vec<u8> {
        let len = rng.gen_range(self.min_code_len..=self.max_code_len);
        (0..len)
            .map(|_| {
                if rng.gen_bool(0.7) {
                    *INTERESTING_OPCODES.choose(&mut *rng).unwrap_or(&0x00)
                } else {
                    rng.gen()
                }
            })
            .collect()
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self {
            min_code_len: 1,
            max_code_len: 256,
            gas: 10_000_000,
        }
    }
}

impl TestGenerator for RandomCodeGenerator {
    type Test = RandomCodeTest;

    fn generate(&self, name: &str) -> Result<RandomCodeTest> {
        let mut rng = rand::thread_rng();
        let code = self.random_code(&mut rng);
        let calldata: Vec<u8> = (0..rng.gen_range(0..=64)).map(|_| rng.gen()).collect();

        Ok(RandomCodeTest {
            name: name.to_string(),
            code: to_hex(&code),
            calldata: to_hex(&calldata),
            gas: self.gas,
            value: if rng.gen_bool(0.1) { rng.gen_range(1..=1_000_000) } else { 0 },
        })
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}
