/*!
 * Splitting of multi-drug cells
 *
 * Registry cells routinely hold several drugs at once: one per line,
 * numbered `1)` / `2.` lists, or plain comma lists. Every form is reduced
 * to a `;`-separated list before splitting.
 */

use regex::Regex;

use crate::constants::MIN_TOKEN_LEN;

lazy_static::lazy_static! {
    static ref LINE_BREAK: Regex = Regex::new(r"\r\n|\r|\n").expect("valid line break pattern");
    static ref ENUMERATION: Regex = Regex::new(r"[0-9]+[).]").expect("valid enumeration pattern");
}

const SEPARATOR: char = ';';

/// Splits drug-list cells into discrete drug names
#[derive(Debug, Clone)]
pub struct DrugListParser {
    /// Pieces with this many characters or fewer are discarded
    min_token_len: usize,
}

impl Default for DrugListParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DrugListParser {
    pub fn new() -> Self {
        Self { min_token_len: MIN_TOKEN_LEN }
    }

    pub fn with_min_token_len(mut self, len: usize) -> Self {
        self.min_token_len = len;
        self
    }

    /// Split one cell into drug names, left to right.
    ///
    /// Duplicates are kept: a drug listed twice yields two entries.
    pub fn split_drugs(&self, cell_text: Option<&str>) -> Vec<String> {
        let Some(text) = cell_text else {
            return Vec::new();
        };

        let text = LINE_BREAK.replace_all(text, ";");
        let text = ENUMERATION.replace_all(&text, ";");

        // Commas separate only when nothing else does
        let separator = if !text.contains(SEPARATOR) && text.contains(',') {
            ','
        } else {
            SEPARATOR
        };

        text.split(separator)
            .map(str::trim)
            .filter(|piece| piece.chars().count() > self.min_token_len)
            .map(str::to_string)
            .collect()
    }
}

/// Split with the default token length
pub fn split_drugs(cell_text: Option<&str>) -> Vec<String> {
    DrugListParser::new().split_drugs(cell_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_list_on_lines() {
        assert_eq!(
            split_drugs(Some("1) Paracetamol\n2) Ibuprofen")),
            vec!["Paracetamol", "Ibuprofen"]
        );
    }

    #[test]
    fn test_dotted_enumeration() {
        assert_eq!(
            split_drugs(Some("1. Nobivac Rabies 2. Nobivac DHPPi")),
            vec!["Nobivac Rabies", "Nobivac DHPPi"]
        );
    }

    #[test]
    fn test_comma_fallback() {
        assert_eq!(split_drugs(Some("Aspirin, Citramon")), vec!["Aspirin", "Citramon"]);
        assert_eq!(
            split_drugs(Some("Aspirin, forte; Citramon")),
            vec!["Aspirin, forte", "Citramon"]
        );
    }

    #[test]
    fn test_line_breaks_disable_comma_fallback() {
        assert_eq!(
            split_drugs(Some("Aspirin, forte\r\nCitramon")),
            vec!["Aspirin, forte", "Citramon"]
        );
    }

    #[test]
    fn test_short_pieces_dropped() {
        let drugs = split_drugs(Some("1) A; 22; Bravecto; ok;\n3)"));
        assert_eq!(drugs, vec!["Bravecto"]);
        assert!(drugs.iter().all(|d| d.chars().count() > 2));
    }

    #[test]
    fn test_duplicates_preserved() {
        assert_eq!(
            split_drugs(Some("Rabisin; Rabisin")),
            vec!["Rabisin", "Rabisin"]
        );
    }

    #[test]
    fn test_missing_and_blank() {
        assert!(split_drugs(None).is_empty());
        assert!(split_drugs(Some("   ")).is_empty());
    }

    #[test]
    fn test_cyrillic_length_in_characters() {
        // three Cyrillic letters are six bytes but only three characters
        assert_eq!(split_drugs(Some("Вет; Ка")), vec!["Вет"]);
    }
}
