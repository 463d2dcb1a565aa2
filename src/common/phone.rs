// src/common/phone.rs

// Normalização de telefones para o formato E.164 (padrão EUA).

/// Normalização estrita usada pelo webhook de disparo.
/// Aceita números já com `+`, 10 dígitos (assume +1) ou 11 dígitos começando com 1.
pub fn normalize_e164(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if let Some(rest) = cleaned.strip_prefix('+') {
        // '+' só é válido no início
        if rest.is_empty() || rest.contains('+') || rest.len() < 10 {
            return None;
        }
        return Some(cleaned);
    }

    let digits = match cleaned.len() {
        11 if cleaned.starts_with('1') => &cleaned[1..],
        10 => cleaned.as_str(),
        _ => return None,
    };

    Some(format!("+1{}", digits))
}

/// Normalização tolerante para números vindos do gateway.
/// Um '+' não codificado no form chega como espaço.
pub fn normalize_inbound(raw: &str) -> String {
    if raw.starts_with(' ') {
        return format!("+{}", raw.trim());
    }

    let trimmed = raw.trim();
    if trimmed.starts_with('+') {
        return trimmed.to_string();
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        10 => format!("+1{}", digits),
        11 if digits.starts_with('1') => format!("+{}", digits),
        _ => trimmed.to_string(),
    }
}
