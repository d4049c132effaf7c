//! Text-level field substitution
//!
//! Produces the formula as it would read with every field replaced by its
//! literal. Evaluation does not go through this text; it binds the same literals
//! to identifier nodes. The two agree, which makes the substituted text useful
//! for previews and debugging.

use crate::error::FormulaResult;
use crate::formula::coercion::coerce;
use crate::formula::parser::{Token, tokenize};
use calcforge_types::FieldValueMap;

/// Replace every whole identifier that names a field in `values` with its
/// coerced literal.
///
/// Identifiers are matched as whole tokens, so `a` never matches inside `abc`
/// or inside a string literal. Callees (`sqrt(`), the `Math` namespace and its
/// members are never replaced. Whitespace and all other text are kept as is.
pub fn substitute(formula: &str, values: &FieldValueMap) -> FormulaResult<String> {
    let tokens = tokenize(formula)?;
    let mut output = String::with_capacity(formula.len());
    let mut copied_up_to = 0;

    for (i, spanned) in tokens.iter().enumerate() {
        let Token::Identifier(name) = &spanned.token else {
            continue;
        };
        let Some(value) = values.get(name) else {
            continue;
        };

        let next = tokens.get(i + 1).map(|t| &t.token);
        let previous = i.checked_sub(1).and_then(|p| tokens.get(p)).map(|t| &t.token);
        if matches!(next, Some(Token::LeftParen | Token::Dot)) || matches!(previous, Some(Token::Dot)) {
            continue;
        }

        output.push_str(&formula[copied_up_to..spanned.start]);
        output.push_str(&coerce(value).to_string());
        copied_up_to = spanned.end;
    }

    output.push_str(&formula[copied_up_to..]);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcforge_types::FieldValue;

    fn values(pairs: &[(&str, FieldValue)]) -> FieldValueMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_whole_token_replacement() {
        let map = values(&[("a", 1.0.into()), ("abc", 2.0.into())]);
        assert_eq!(substitute("abc + a", &map).unwrap(), "2 + 1");
    }

    #[test]
    fn test_callees_and_strings_are_untouched() {
        let map = values(&[("sqrt", 9.0.into()), ("x", 4.0.into()), ("PI", 3.0.into())]);
        assert_eq!(
            substitute("sqrt(x) + 'x' + Math.PI + PI", &map).unwrap(),
            "sqrt(4) + 'x' + Math.PI + 3"
        );
    }

    #[test]
    fn test_literal_forms() {
        let map = values(&[
            ("b", (-5.0).into()),
            ("born", "01/01/1990".into()),
            ("name", "Ada".into()),
            ("empty", FieldValue::Null),
            ("agree", true.into()),
        ]);
        assert_eq!(
            substitute("b*b, date(born), name, empty, agree", &map).unwrap(),
            r#"(-5)*(-5), date("01/01/1990"), "Ada", "", true"#
        );
    }

    #[test]
    fn test_unreferenced_fields_and_spacing() {
        let map = values(&[("unused", 1.0.into()), ("w", 70.0.into())]);
        assert_eq!(substitute("  w /\n 2 ", &map).unwrap(), "  70 /\n 2 ");
    }

    #[test]
    fn test_rejects_disallowed_characters() {
        let map = values(&[("a", 1.0.into())]);
        assert!(substitute("a; b", &map).is_err());
    }
}
