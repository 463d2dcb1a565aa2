// src/services/templates.rs

use std::collections::HashMap;

use crate::models::{
    contact::Contact,
    contractor::{ContractorConfig, TemplatePurpose},
};

pub type TemplateVars = HashMap<&'static str, String>;

/// Substitui `{{chave}}` pelos valores de `vars`.
/// Chaves desconhecidas ficam literais; valores não são reprocessados.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            // "{{" sem fechamento: copia o resto como está
            out.push_str(&rest[start..]);
            return out;
        };

        let key = after_open[..end].trim();
        match vars.get(key) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Variáveis padrão: primeiro nome do contato, nome do negócio e link de review.
pub fn standard_vars(contractor: &ContractorConfig, contact: &Contact) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert("contact_name", contact.first_name().to_string());
    vars.insert("business_name", contractor.business_name.clone());
    vars.insert(
        "review_link",
        contractor.google_review_link.clone().unwrap_or_default(),
    );
    vars
}

pub fn render_for(contractor: &ContractorConfig, contact: &Contact, purpose: TemplatePurpose) -> String {
    render(contractor.template(purpose), &standard_vars(contractor, contact))
}

/// Template do webhook externo, personalizado por tipo de serviço e técnico.
pub fn trigger_template<'a>(
    contractor: &'a ContractorConfig,
    job_type: Option<&str>,
    tech_name: Option<&str>,
) -> &'a str {
    match (job_type.is_some(), tech_name.is_some()) {
        (true, true) => {
            "Hey {{contact_name}}, how was your {{job_type}} with {{tech_name}} from {{business_name}}? Reply 1-5"
        }
        (false, true) => {
            "Hey {{contact_name}}, how was your service with {{tech_name}} from {{business_name}}? Reply 1-5"
        }
        (true, false) => "Hey {{contact_name}}, how was your {{job_type}} with {{business_name}}? Reply 1-5",
        (false, false) => contractor.template(TemplatePurpose::ReviewRequest),
    }
}
