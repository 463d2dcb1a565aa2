// src/services/classifier.rs

// Extrai a nota (1..=5) de uma resposta por SMS.

use std::sync::LazyLock;

use regex::Regex;

// Formatos completos, testados antes do prefixo genérico.
static RATING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^([1-5])\s*(?:stars?|/\s*5)?$",
        r"^rated?\s*([1-5])$",
        r"^([1-5])\s*out\s*of\s*5$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("rating pattern is valid"))
    .collect()
});

// Mensagem que começa com a nota ("5 - great job", "4, thanks").
// \b impede que "10" ou "55" virem nota.
static LEADING_RATING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([1-5])\b").expect("leading rating pattern is valid"));

/// Devolve a nota 1..=5 ou `None` quando não há sinal claro.
/// Dígitos no meio da frase ("You guys are #1") são ignorados.
pub fn classify_rating(body: &str) -> Option<u8> {
    let cleaned = body.trim().to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    RATING_PATTERNS
        .iter()
        .chain(std::iter::once(&*LEADING_RATING))
        .find_map(|re| re.captures(&cleaned))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
}
