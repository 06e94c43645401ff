use crate::error::AssembleError;
use crate::Word;

/// Parse a numeric literal.
///
/// `0x` prefixes hexadecimal, `0b` binary, a leading zero with further
/// digits octal; anything else is decimal. A bare `0` is decimal zero.
pub fn parse(arg: &str) -> Result<Word, AssembleError> {
    let (digits, radix) = if let Some(hex) = arg.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = arg.strip_prefix("0b") {
        (bin, 2)
    } else if arg.len() > 1 && arg.starts_with('0') {
        (&arg[1..], 8)
    } else {
        (arg, 10)
    };

    Word::from_str_radix(digits, radix).map_err(|_| AssembleError::BadLiteral(arg.to_string()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("0x10", 0x10)]
    #[case("0xFFFF", 0xFFFF)]
    #[case("0b101", 5)]
    #[case("017", 0o17)]
    #[case("42", 42)]
    #[case("0", 0)]
    #[case("65535", 65535)]
    fn parses_every_radix(#[case] arg: &str, #[case] expected: Word) {
        assert_eq!(parse(arg).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("0x")]
    #[case("0xZZ")]
    #[case("0b2")]
    #[case("09")]
    #[case("R9")]
    #[case("-1")]
    fn rejects_malformed_literals(#[case] arg: &str) {
        assert!(matches!(parse(arg), Err(AssembleError::BadLiteral(_))));
    }

    #[test]
    fn values_wider_than_a_word_fail() {
        assert!(parse("0x100000000").is_err());
    }
}
