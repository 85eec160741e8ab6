//! Challenges and Challenge Generation
//!
//! A challenge is an immutable operand list plus an operator. The answer is
//! never stored independently of the operands: it is always computed by
//! [`OperatorSymbol::evaluate`], so a challenge cannot disagree with itself.

use std::fmt;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::rng::DeterministicRng;
use crate::game::category::MathCategory;
use crate::{MAX_DIFFICULTY, MIN_DIFFICULTY};

// =============================================================================
// OPERATOR
// =============================================================================

/// Operator a challenge is evaluated with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperatorSymbol {
    /// `+`
    #[serde(rename = "+")]
    Add = 0,
    /// `-`
    #[serde(rename = "-")]
    Subtract = 1,
    /// `×`
    #[serde(rename = "×")]
    Multiply = 2,
    /// `÷`
    #[serde(rename = "÷")]
    Divide = 3,
    /// `?`: `n0 × n1 + n2 + ...`
    #[serde(rename = "?")]
    Mixed = 4,
    /// `%`: `p% of n`
    #[serde(rename = "%")]
    Percent = 5,
    /// `^`: `b ^ e`
    #[serde(rename = "^")]
    Power = 6,
}

impl OperatorSymbol {
    /// Display symbol.
    pub const fn symbol(self) -> char {
        match self {
            OperatorSymbol::Add => '+',
            OperatorSymbol::Subtract => '-',
            OperatorSymbol::Multiply => '×',
            OperatorSymbol::Divide => '÷',
            OperatorSymbol::Mixed => '?',
            OperatorSymbol::Percent => '%',
            OperatorSymbol::Power => '^',
        }
    }

    /// Evaluate the operator over `numbers`.
    ///
    /// Returns `None` when the operand count is wrong for the operator,
    /// on overflow, on division by zero, and on inexact division or
    /// percentage.
    pub fn evaluate(self, numbers: &[i64]) -> Option<i64> {
        let (first, rest) = numbers.split_first()?;

        match self {
            OperatorSymbol::Add | OperatorSymbol::Subtract | OperatorSymbol::Multiply
            | OperatorSymbol::Divide if rest.is_empty() => None,
            OperatorSymbol::Add => rest.iter().try_fold(*first, |acc, n| acc.checked_add(*n)),
            OperatorSymbol::Subtract => rest.iter().try_fold(*first, |acc, n| acc.checked_sub(*n)),
            OperatorSymbol::Multiply => rest.iter().try_fold(*first, |acc, n| acc.checked_mul(*n)),
            OperatorSymbol::Divide => rest.iter().try_fold(*first, |acc, &n| {
                if acc.checked_rem(n)? != 0 {
                    return None;
                }
                acc.checked_div(n)
            }),
            OperatorSymbol::Mixed => {
                if numbers.len() < 3 {
                    return None;
                }
                let product = numbers[0].checked_mul(numbers[1])?;
                numbers[2..].iter().try_fold(product, |acc, n| acc.checked_add(*n))
            }
            OperatorSymbol::Percent => match numbers {
                [percent, of] => {
                    let scaled = percent.checked_mul(*of)?;
                    (scaled % 100 == 0).then_some(scaled / 100)
                }
                _ => None,
            },
            OperatorSymbol::Power => match numbers {
                [base, exponent] => base.checked_pow(u32::try_from(*exponent).ok()?),
                _ => None,
            },
        }
    }

    /// Default question text for `numbers`.
    pub fn render(self, numbers: &[i64]) -> String {
        let join = |sep: &str, items: &[i64]| {
            items.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(sep)
        };

        match (self, numbers) {
            (OperatorSymbol::Mixed, [a, b, rest @ ..]) if !rest.is_empty() => {
                format!("{} × {} + {}", a, b, join(" + ", rest))
            }
            (OperatorSymbol::Percent, [percent, of]) => format!("{}% of {}", percent, of),
            (OperatorSymbol::Power, [base, exponent]) => format!("{}^{}", base, exponent),
            _ => join(&format!(" {} ", self.symbol()), numbers),
        }
    }
}

impl fmt::Display for OperatorSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// =============================================================================
// CHALLENGE
// =============================================================================

/// A single math problem with a known answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    numbers: Vec<i64>,
    #[serde(rename = "operatorSymbol")]
    operator: OperatorSymbol,
    question: String,
    answer: i64,
}

impl Challenge {
    /// Build a challenge, deriving the answer from the operands.
    pub fn new(
        numbers: Vec<i64>,
        operator: OperatorSymbol,
        question: impl Into<String>,
    ) -> Result<Self, ChallengeError> {
        let answer = operator
            .evaluate(&numbers)
            .ok_or_else(|| ChallengeError::Undefined { operator, numbers: numbers.clone() })?;

        Ok(Self {
            numbers,
            operator,
            question: question.into(),
            answer,
        })
    }

    /// Build a challenge with the operator's default question text.
    pub fn rendered(numbers: Vec<i64>, operator: OperatorSymbol) -> Result<Self, ChallengeError> {
        let question = operator.render(&numbers);
        Self::new(numbers, operator, question)
    }

    /// Operands, in order.
    pub fn numbers(&self) -> &[i64] {
        &self.numbers
    }

    /// Operator the answer is evaluated with.
    pub fn operator(&self) -> OperatorSymbol {
        self.operator
    }

    /// Display string.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Ground truth.
    pub fn answer(&self) -> i64 {
        self.answer
    }

    /// Check a submitted answer.
    pub fn is_correct(&self, submitted: i64) -> bool {
        submitted == self.answer
    }
}

/// Challenge construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChallengeError {
    /// Operator is undefined over the operands.
    #[error("{operator} is undefined over {numbers:?}")]
    Undefined {
        /// Operator that failed
        operator: OperatorSymbol,
        /// Offending operands
        numbers: Vec<i64>,
    },
    /// Difficulty outside `[MIN_DIFFICULTY, MAX_DIFFICULTY]`.
    #[error("difficulty {0} out of range")]
    DifficultyOutOfRange(u8),
    /// Generator has no rule for this category.
    #[error("no generator for category {0}")]
    UnsupportedCategory(MathCategory),
}

// =============================================================================
// GENERATION
// =============================================================================

/// Produces challenges for a category and difficulty.
///
/// Implementations must draw all randomness from `rng` so that sessions
/// replay deterministically.
pub trait ChallengeGenerator: Send + Sync {
    /// Generate one challenge.
    fn generate(
        &self,
        category: MathCategory,
        difficulty: u8,
        rng: &mut DeterministicRng,
    ) -> Result<Challenge, ChallengeError>;
}

/// Percentages offered, easiest first.
const PERCENTS: [i64; 10] = [10, 50, 25, 20, 5, 15, 75, 30, 40, 60];

/// Built-in generator for every [`MathCategory`].
///
/// Operand size and count grow with difficulty. Subtraction and algebra
/// never produce negative answers; division and percentages are exact.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArithmeticGenerator;

impl ArithmeticGenerator {
    /// Upper bound for additive operands.
    fn operand_max(difficulty: u8) -> i64 {
        10 * difficulty as i64
    }

    /// Upper bound for factors and divisors.
    fn factor_max(difficulty: u8) -> i64 {
        5 + difficulty as i64
    }

    /// Number of addends (2 at levels 1-3, up to 4).
    fn addend_count(difficulty: u8) -> usize {
        (2 + (difficulty as usize - 1) / 3).min(4)
    }
}

impl ChallengeGenerator for ArithmeticGenerator {
    fn generate(
        &self,
        category: MathCategory,
        difficulty: u8,
        rng: &mut DeterministicRng,
    ) -> Result<Challenge, ChallengeError> {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
            return Err(ChallengeError::DifficultyOutOfRange(difficulty));
        }

        let operand_max = Self::operand_max(difficulty);
        let factor_max = Self::factor_max(difficulty);
        let operator = category.operator();

        match category {
            MathCategory::Addition => {
                let numbers = (0..Self::addend_count(difficulty))
                    .map(|_| rng.next_range(1, operand_max))
                    .collect();
                Challenge::rendered(numbers, operator)
            }
            MathCategory::Subtraction => {
                let minuend = rng.next_range(2, operand_max);
                let subtrahend = rng.next_range(1, minuend);
                Challenge::rendered(vec![minuend, subtrahend], operator)
            }
            MathCategory::Multiplication => {
                let a = rng.next_range(2, factor_max);
                let b = rng.next_range(2, factor_max);
                Challenge::rendered(vec![a, b], operator)
            }
            MathCategory::Division => {
                let divisor = rng.next_range(2, factor_max);
                let quotient = rng.next_range(1, factor_max);
                Challenge::rendered(vec![divisor * quotient, divisor], operator)
            }
            MathCategory::Mixed => {
                let a = rng.next_range(2, factor_max);
                let b = rng.next_range(2, factor_max);
                let c = rng.next_range(1, operand_max);
                Challenge::rendered(vec![a, b, c], operator)
            }
            MathCategory::Algebra => {
                let addend = rng.next_range(1, operand_max);
                let unknown = rng.next_range(1, operand_max);
                let total = addend + unknown;
                Challenge::new(
                    vec![total, addend],
                    operator,
                    format!("x + {} = {}", addend, total),
                )
            }
            MathCategory::Percentages => {
                let offered = (2 + difficulty as usize).min(PERCENTS.len());
                let percent = rng.choose(&PERCENTS[..offered]).copied().unwrap_or(PERCENTS[0]);
                let of = 20 * rng.next_range(1, 5 * difficulty as i64);
                Challenge::rendered(vec![percent, of], operator)
            }
            MathCategory::Exponents => {
                let base = rng.next_range(2, 2 + difficulty as i64 / 2);
                let exponent = rng.next_range(2, 2 + difficulty as i64 / 4);
                Challenge::rendered(vec![base, exponent], operator)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_evaluate_basic_operators() {
        assert_eq!(OperatorSymbol::Add.evaluate(&[12, 7, 3]), Some(22));
        assert_eq!(OperatorSymbol::Subtract.evaluate(&[12, 7]), Some(5));
        assert_eq!(OperatorSymbol::Multiply.evaluate(&[6, 7]), Some(42));
        assert_eq!(OperatorSymbol::Divide.evaluate(&[42, 6]), Some(7));
        assert_eq!(OperatorSymbol::Mixed.evaluate(&[3, 4, 5]), Some(17));
        assert_eq!(OperatorSymbol::Percent.evaluate(&[25, 80]), Some(20));
        assert_eq!(OperatorSymbol::Power.evaluate(&[2, 5]), Some(32));
    }

    #[test]
    fn test_evaluate_undefined_cases() {
        assert_eq!(OperatorSymbol::Add.evaluate(&[]), None);
        assert_eq!(OperatorSymbol::Add.evaluate(&[4]), None);
        assert_eq!(OperatorSymbol::Divide.evaluate(&[7, 0]), None);
        assert_eq!(OperatorSymbol::Divide.evaluate(&[7, 2]), None);
        assert_eq!(OperatorSymbol::Mixed.evaluate(&[3, 4]), None);
        assert_eq!(OperatorSymbol::Percent.evaluate(&[5, 30]), None);
        assert_eq!(OperatorSymbol::Percent.evaluate(&[5, 30, 2]), None);
        assert_eq!(OperatorSymbol::Power.evaluate(&[2, -1]), None);
        assert_eq!(OperatorSymbol::Multiply.evaluate(&[i64::MAX, 2]), None);
        assert_eq!(OperatorSymbol::Divide.evaluate(&[i64::MIN, -1]), None);
    }

    #[test]
    fn test_render() {
        assert_eq!(OperatorSymbol::Add.render(&[12, 7]), "12 + 7");
        assert_eq!(OperatorSymbol::Multiply.render(&[6, 7]), "6 × 7");
        assert_eq!(OperatorSymbol::Divide.render(&[42, 6]), "42 ÷ 6");
        assert_eq!(OperatorSymbol::Mixed.render(&[3, 4, 5]), "3 × 4 + 5");
        assert_eq!(OperatorSymbol::Percent.render(&[25, 80]), "25% of 80");
        assert_eq!(OperatorSymbol::Power.render(&[2, 5]), "2^5");
    }

    #[test]
    fn test_challenge_rejects_undefined() {
        let err = Challenge::rendered(vec![7, 0], OperatorSymbol::Divide).unwrap_err();
        assert!(matches!(err, ChallengeError::Undefined { .. }));
    }

    #[test]
    fn test_addition_at_level_one() {
        let mut rng = DeterministicRng::new(1);
        let challenge = ArithmeticGenerator
            .generate(MathCategory::Addition, 1, &mut rng)
            .unwrap();

        assert_eq!(challenge.operator().symbol(), '+');
        assert_eq!(challenge.numbers().len(), 2);
        assert!(challenge.numbers().iter().all(|n| (1..=10).contains(n)));
    }

    #[test]
    fn test_algebra_question() {
        let mut rng = DeterministicRng::new(3);
        let challenge = ArithmeticGenerator
            .generate(MathCategory::Algebra, 2, &mut rng)
            .unwrap();

        let [total, addend] = [challenge.numbers()[0], challenge.numbers()[1]];
        assert_eq!(challenge.question(), format!("x + {} = {}", addend, total));
        assert_eq!(challenge.answer() + addend, total);
    }

    #[test]
    fn test_rejects_out_of_range_difficulty() {
        let mut rng = DeterministicRng::new(1);
        assert_eq!(
            ArithmeticGenerator.generate(MathCategory::Addition, 0, &mut rng),
            Err(ChallengeError::DifficultyOutOfRange(0))
        );
        assert_eq!(
            ArithmeticGenerator.generate(MathCategory::Addition, 11, &mut rng),
            Err(ChallengeError::DifficultyOutOfRange(11))
        );
    }

    #[test]
    fn test_generation_is_deterministic() {
        let mut rng1 = DeterministicRng::new(77);
        let mut rng2 = DeterministicRng::new(77);

        for category in MathCategory::ALL {
            let a = ArithmeticGenerator.generate(category, 5, &mut rng1).unwrap();
            let b = ArithmeticGenerator.generate(category, 5, &mut rng2).unwrap();
            assert_eq!(a, b);
        }
    }

    proptest! {
        #[test]
        fn prop_answer_matches_operands(
            seed in any::<u64>(),
            category_idx in 0usize..MathCategory::ALL.len(),
            difficulty in MIN_DIFFICULTY..=MAX_DIFFICULTY,
        ) {
            let category = MathCategory::ALL[category_idx];
            let mut rng = DeterministicRng::new(seed);
            let challenge = ArithmeticGenerator.generate(category, difficulty, &mut rng).unwrap();

            prop_assert_eq!(challenge.operator(), category.operator());
            prop_assert_eq!(
                challenge.operator().evaluate(challenge.numbers()),
                Some(challenge.answer())
            );
            prop_assert!(challenge.answer() >= 0);
        }

        #[test]
        fn prop_operand_count_grows_with_difficulty(seed in any::<u64>(), difficulty in 1u8..10) {
            let mut rng = DeterministicRng::new(seed);
            let easy = ArithmeticGenerator.generate(MathCategory::Addition, difficulty, &mut rng).unwrap();
            let hard = ArithmeticGenerator.generate(MathCategory::Addition, difficulty + 1, &mut rng).unwrap();
            prop_assert!(hard.numbers().len() >= easy.numbers().len());
        }
    }
}
