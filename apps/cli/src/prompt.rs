//! Interactive input: confirmations and prices.

use std::io::{BufRead, Write};

use anyhow::{bail, Context};

use panier_core::validation::validate_price_cents;
use panier_core::{Confirmation, DestructiveAction};

/// Asks the action's question and checks the answer.
pub fn confirm_with(
    action: DestructiveAction,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<Confirmation> {
    write!(output, "{} ", action.prompt())?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(action.confirm(&answer)?)
}

/// Confirmation from the terminal.
pub fn confirm(action: DestructiveAction) -> anyhow::Result<Confirmation> {
    confirm_with(action, &mut std::io::stdin().lock(), &mut std::io::stdout())
}

/// Reads one trimmed line from the terminal after `question`.
pub fn read_line(question: &str) -> anyhow::Result<String> {
    print!("{} ", question);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Parses a price typed as `2,49`, `2.49`, `2` or `2,49 €` into cents.
pub fn parse_price(input: &str) -> anyhow::Result<i64> {
    let normalized = input.trim().trim_end_matches('€').trim().replace(',', ".");
    let (whole, fraction) = normalized
        .split_once('.')
        .unwrap_or((normalized.as_str(), ""));

    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        bail!("Prix invalide: {}", input);
    }
    if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        bail!("Prix invalide: {} (2 décimales maximum)", input);
    }

    let euros: i64 = whole
        .parse()
        .with_context(|| format!("Prix invalide: {}", input))?;
    let cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>()? * 10,
        _ => fraction.parse::<i64>()?,
    };

    let total = euros
        .checked_mul(100)
        .and_then(|c| c.checked_add(cents))
        .with_context(|| format!("Prix invalide: {}", input))?;
    validate_price_cents(total)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("2,49").unwrap(), 249);
        assert_eq!(parse_price("2.5").unwrap(), 250);
        assert_eq!(parse_price("3").unwrap(), 300);
        assert_eq!(parse_price(" 12,50 € ").unwrap(), 1250);
        assert_eq!(parse_price("0,05").unwrap(), 5);
    }

    #[test]
    fn test_parse_price_rejects_garbage() {
        assert!(parse_price("").is_err());
        assert!(parse_price("-1").is_err());
        assert!(parse_price("2,499").is_err());
        assert!(parse_price("abc").is_err());
        assert!(parse_price(",50").is_err());
    }

    #[test]
    fn test_confirm_reads_answer() {
        let action = DestructiveAction::DeleteStore { store_id: 1 };
        let mut output = Vec::new();

        let confirmation = confirm_with(action, &mut Cursor::new("oui\n"), &mut output).unwrap();
        assert_eq!(confirmation.action(), action);
        assert!(String::from_utf8(output).unwrap().contains("(oui/non)"));

        let refused = confirm_with(action, &mut Cursor::new("non\n"), &mut Vec::new());
        assert!(refused.is_err());
    }

    #[test]
    fn test_reset_needs_the_word() {
        let action = DestructiveAction::ResetDatabase;
        assert!(confirm_with(action, &mut Cursor::new("oui\n"), &mut Vec::new()).is_err());
        assert!(confirm_with(action, &mut Cursor::new("Confirmer\n"), &mut Vec::new()).is_ok());
    }
}
