// eval/equation.rs - Single-variable equation validation and evaluation
//
// `check_syntax` is the guard applied before an edit is committed. It only
// checks the character set and parenthesis balance; whether the equation
// actually evaluates is decided by `compiled::compile`.

use crate::error::{EquationError, SyntaxError};
use crate::eval::compiled::compile;

#[inline]
fn is_allowed(c: char) -> bool {
    matches!(c, 'x' | '0'..='9' | '+' | '-' | '*' | '/' | '^' | '(' | ')') || c.is_whitespace()
}

/// Check an equation against the allowed character set and parenthesis
/// balance. Blank equations are accepted as placeholders.
pub fn check_syntax(equation: &str) -> Result<(), SyntaxError> {
    if equation.trim().is_empty() {
        return Ok(());
    }

    let mut open = 0usize;
    let mut last_open = 0usize;
    for (position, ch) in equation.chars().enumerate() {
        match ch {
            '(' => {
                open += 1;
                last_open = position;
            }
            ')' => {
                open = open
                    .checked_sub(1)
                    .ok_or(SyntaxError::UnbalancedParentheses { position })?;
            }
            c if !is_allowed(c) => {
                return Err(SyntaxError::DisallowedCharacter { ch: c, position });
            }
            _ => {}
        }
    }

    if open != 0 {
        return Err(SyntaxError::UnbalancedParentheses {
            position: last_open,
        });
    }
    Ok(())
}

/// `true` if the equation may be committed to a node.
pub fn validate_equation(equation: &str) -> bool {
    check_syntax(equation).is_ok()
}

/// Evaluate `equation` at `x`, reporting any failure.
pub fn try_evaluate(x: f64, equation: &str) -> Result<f64, EquationError> {
    compile(equation)?.evaluate(x)
}

/// Evaluate `equation` at `x`. Failures are logged and yield `0.0`.
pub fn evaluate_equation(x: f64, equation: &str) -> f64 {
    try_evaluate(x, equation).unwrap_or_else(|err| {
        log::warn!("failed to evaluate '{equation}' at x = {x}: {err}");
        0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_grammar() {
        assert!(validate_equation("x^2+3*(x-1)"));
        assert!(validate_equation("2*x+4"));
        assert!(validate_equation("((x))"));
        assert!(validate_equation(" x / 2 "));
    }

    #[test]
    fn blank_is_valid() {
        assert!(validate_equation(""));
        assert!(validate_equation("   \t"));
    }

    #[test]
    fn rejects_other_letters_and_symbols() {
        assert!(!validate_equation("x^2+a"));
        assert!(!validate_equation("X+1"));
        assert!(!validate_equation("x.5"));
        assert!(!validate_equation("x%2"));
        assert!(!validate_equation("alert(1)"));
        assert_eq!(
            check_syntax("2*y"),
            Err(SyntaxError::DisallowedCharacter { ch: 'y', position: 2 })
        );
    }

    #[test]
    fn rejects_unbalanced_parentheses() {
        assert!(!validate_equation("(x+1"));
        assert!(!validate_equation("x+1)"));
        assert!(!validate_equation(")x+1("));
        assert_eq!(
            check_syntax("x)("),
            Err(SyntaxError::UnbalancedParentheses { position: 1 })
        );
        assert_eq!(
            check_syntax("((x)"),
            Err(SyntaxError::UnbalancedParentheses { position: 1 })
        );
    }

    #[test]
    fn syntactically_valid_is_not_necessarily_evaluable() {
        assert!(validate_equation("**+"));
        assert!(try_evaluate(1.0, "**+").is_err());
        assert_eq!(evaluate_equation(1.0, "**+"), 0.0);
    }

    #[test]
    fn evaluates_reference_equations() {
        assert_eq!(evaluate_equation(2.0, "x^2"), 4.0);
        assert_eq!(evaluate_equation(3.0, "2*x+4"), 10.0);
        assert_eq!(evaluate_equation(4.0, "x-2"), 2.0);
        assert_eq!(evaluate_equation(4.0, "x/2"), 2.0);
        assert_eq!(evaluate_equation(22.0, "x^2+20"), 504.0);
    }

    #[test]
    fn deeply_nested_input_falls_back_to_zero() {
        let parens = format!("{}x{}", "(".repeat(10_000), ")".repeat(10_000));
        let negations = format!("{}x", "-".repeat(10_000));
        for src in [&parens, &negations] {
            assert!(validate_equation(src));
            assert_eq!(evaluate_equation(3.0, src), 0.0);
            assert!(matches!(
                try_evaluate(3.0, src),
                Err(EquationError::TooDeep { .. })
            ));
        }
    }

    #[test]
    fn non_finite_falls_back_to_zero() {
        assert_eq!(evaluate_equation(0.0, "1/x"), 0.0);
        assert!(matches!(
            try_evaluate(0.0, "x/x"),
            Err(EquationError::NonFinite { .. })
        ));
    }

    #[test]
    fn decimal_inputs_are_supported() {
        assert_eq!(evaluate_equation(2.5, "2*x"), 5.0);
        assert_eq!(evaluate_equation(-1.5, "x^2"), 2.25);
    }
}
