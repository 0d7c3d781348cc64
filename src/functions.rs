// ABOUTME: Whitelisted function library - case-insensitive dispatch over the named math functions

use crate::error::EvalError;

/// Looks up and invokes a whitelisted function by name (case-insensitive).
/// Returns `UnknownFunction` for anything not in the whitelist, and
/// `ArityMismatch`/`DomainError`/`DivisionByZero`/`Overflow` for misuse of a
/// known one. `IF` is handled by the evaluator directly (it needs
/// short-circuit access to unevaluated branches) and is not dispatched here.
pub fn call(name: &str, args: &[f64]) -> Result<f64, EvalError> {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "ABS" => unary(&upper, args, f64::abs),
        "SQRT" => unary_checked(&upper, args, |x| {
            if x < 0.0 {
                Err(EvalError::DomainError {
                    function: upper.clone(),
                    value: x,
                })
            } else {
                Ok(x.sqrt())
            }
        }),
        "ROUND" => unary(&upper, args, round_half_away_from_zero),
        "FLOOR" => unary(&upper, args, f64::floor),
        "CEIL" => unary(&upper, args, f64::ceil),
        "TRUNCATE" => unary(&upper, args, f64::trunc),
        "SIGN" => unary(&upper, args, |x| {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }
        }),
        "MIN" => variadic(&upper, args, |vals| {
            vals.iter().copied().fold(f64::INFINITY, f64::min)
        }),
        "MAX" => variadic(&upper, args, |vals| {
            vals.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        }),
        "SUM" => variadic(&upper, args, |vals| vals.iter().sum()),
        "AVG" => variadic(&upper, args, |vals| vals.iter().sum::<f64>() / vals.len() as f64),
        "POW" => binary(&upper, args, |a, b| a.powf(b)),
        "MOD" => binary_checked(&upper, args, |a, b| {
            if b == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(a % b)
            }
        }),
        "LOG" => unary_checked(&upper, args, |x| {
            if x <= 0.0 {
                Err(EvalError::DomainError {
                    function: upper.clone(),
                    value: x,
                })
            } else {
                Ok(x.ln())
            }
        }),
        "LOG10" => unary_checked(&upper, args, |x| {
            if x <= 0.0 {
                Err(EvalError::DomainError {
                    function: upper.clone(),
                    value: x,
                })
            } else {
                Ok(x.log10())
            }
        }),
        "EXP" => unary(&upper, args, f64::exp),
        "SIN" => unary(&upper, args, f64::sin),
        "COS" => unary(&upper, args, f64::cos),
        "TAN" => unary(&upper, args, f64::tan),
        "ASIN" => unary_checked(&upper, args, |x| domain_range(&upper, x, -1.0, 1.0, f64::asin)),
        "ACOS" => unary_checked(&upper, args, |x| domain_range(&upper, x, -1.0, 1.0, f64::acos)),
        "ATAN" => unary(&upper, args, f64::atan),
        "SINH" => unary(&upper, args, f64::sinh),
        "COSH" => unary(&upper, args, f64::cosh),
        "TANH" => unary(&upper, args, f64::tanh),
        "ATAN2" => binary(&upper, args, f64::atan2),
        "RADIANS" => unary(&upper, args, f64::to_radians),
        "DEGREES" => unary(&upper, args, f64::to_degrees),
        "PI" => nullary(&upper, args, std::f64::consts::PI),
        "E" => nullary(&upper, args, std::f64::consts::E),
        "GCD" => binary_checked(&upper, args, |a, b| Ok(gcd(a.trunc() as i64, b.trunc() as i64) as f64)),
        "LCM" => binary_checked(&upper, args, |a, b| Ok(lcm(a.trunc() as i64, b.trunc() as i64) as f64)),
        "FACTORIAL" => unary_checked(&upper, args, |x| factorial(&upper, x)),
        "COMBINATION" => binary_checked(&upper, args, |n, k| n_choose_k(&upper, n, k)),
        "PERMUTATION" => binary_checked(&upper, args, |n, k| n_permute_k(&upper, n, k)),
        _ => Err(EvalError::UnknownFunction { name: name.to_string() }),
    }
}

fn round_half_away_from_zero(x: f64) -> f64 {
    if x >= 0.0 {
        (x + 0.5).floor()
    } else {
        (x - 0.5).ceil()
    }
}

fn domain_range(name: &str, x: f64, lo: f64, hi: f64, f: impl Fn(f64) -> f64) -> Result<f64, EvalError> {
    if x < lo || x > hi {
        Err(EvalError::DomainError {
            function: name.to_string(),
            value: x,
        })
    } else {
        Ok(f(x))
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 || b == 0 {
        0
    } else {
        (a / gcd(a, b) * b).abs()
    }
}

fn factorial(name: &str, x: f64) -> Result<f64, EvalError> {
    if x < 0.0 || x.fract() != 0.0 {
        return Err(EvalError::DomainError {
            function: name.to_string(),
            value: x,
        });
    }
    if x > 170.0 {
        return Err(EvalError::DomainError {
            function: name.to_string(),
            value: x,
        });
    }
    let n = x as u64;
    Ok((1..=n).fold(1.0f64, |acc, v| acc * v as f64))
}

fn n_choose_k(name: &str, n: f64, k: f64) -> Result<f64, EvalError> {
    let (n_int, k_int) = validate_n_k(name, n, k)?;
    Ok(falling_factorial(n_int, k_int) / factorial_u64(k_int))
}

fn n_permute_k(name: &str, n: f64, k: f64) -> Result<f64, EvalError> {
    let (n_int, k_int) = validate_n_k(name, n, k)?;
    Ok(falling_factorial(n_int, k_int))
}

fn validate_n_k(name: &str, n: f64, k: f64) -> Result<(u64, u64), EvalError> {
    if n < 0.0 || k < 0.0 || n.fract() != 0.0 || k.fract() != 0.0 || k > n {
        return Err(EvalError::DomainError {
            function: name.to_string(),
            value: n,
        });
    }
    Ok((n as u64, k as u64))
}

fn falling_factorial(n: u64, k: u64) -> f64 {
    (0..k).fold(1.0f64, |acc, i| acc * (n - i) as f64)
}

fn factorial_u64(n: u64) -> f64 {
    (1..=n).fold(1.0f64, |acc, v| acc * v as f64)
}

fn nullary(name: &str, args: &[f64], value: f64) -> Result<f64, EvalError> {
    check_arity(name, args, 0, 0)?;
    Ok(value)
}

fn unary(name: &str, args: &[f64], f: impl Fn(f64) -> f64) -> Result<f64, EvalError> {
    check_arity(name, args, 1, 1)?;
    Ok(f(args[0]))
}

fn unary_checked(
    name: &str,
    args: &[f64],
    f: impl Fn(f64) -> Result<f64, EvalError>,
) -> Result<f64, EvalError> {
    check_arity(name, args, 1, 1)?;
    f(args[0])
}

fn binary(name: &str, args: &[f64], f: impl Fn(f64, f64) -> f64) -> Result<f64, EvalError> {
    check_arity(name, args, 2, 2)?;
    Ok(f(args[0], args[1]))
}

fn binary_checked(
    name: &str,
    args: &[f64],
    f: impl Fn(f64, f64) -> Result<f64, EvalError>,
) -> Result<f64, EvalError> {
    check_arity(name, args, 2, 2)?;
    f(args[0], args[1])
}

fn variadic(name: &str, args: &[f64], f: impl Fn(&[f64]) -> f64) -> Result<f64, EvalError> {
    check_arity(name, args, 1, usize::MAX)?;
    Ok(f(args))
}

fn check_arity(name: &str, args: &[f64], min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else if max == usize::MAX {
            format!("at least {min}")
        } else {
            format!("{min}..={max}")
        };
        return Err(EvalError::ArityMismatch {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Whether `name` (case-insensitive) names a whitelisted function. Used by
/// the evaluator's security policy to reject calls before evaluating args.
pub fn is_known(name: &str) -> bool {
    const NAMES: &[&str] = &[
        "ABS", "SQRT", "ROUND", "FLOOR", "CEIL", "TRUNCATE", "SIGN", "MIN", "MAX", "SUM", "AVG",
        "POW", "MOD", "LOG", "LOG10", "EXP", "SIN", "COS", "TAN", "ASIN", "ACOS", "ATAN", "SINH",
        "COSH", "TANH", "ATAN2", "RADIANS", "DEGREES", "PI", "E", "GCD", "LCM", "FACTORIAL",
        "COMBINATION", "PERMUTATION",
    ];
    NAMES.contains(&name.to_ascii_uppercase().as_str())
}
