//! The `traitscore show` command.

use std::path::PathBuf;

use anyhow::Result;
use serde_json::Value;

use traitscore_core::config::load_config;
use traitscore_core::localization::{
    get_localized_json, get_localized_text, is_rtl_language, validate_language,
};
use traitscore_core::model::{Question, QuestionBank};

pub fn execute(bank_path: PathBuf, lang: Option<String>) -> Result<()> {
    let lang = match lang {
        Some(code) => validate_language(Some(&code)),
        None => load_config()?.default_language,
    };
    let bank = traitscore_core::parser::parse_bank(&bank_path)?;

    print!("{}", render_bank(&bank, &lang));
    Ok(())
}

/// Render every page and question of `bank` in `lang`, falling back to English
/// wherever a translation is missing.
fn render_bank(bank: &QuestionBank, lang: &str) -> String {
    let direction = if is_rtl_language(lang) { "rtl" } else { "ltr" };
    let mut out = format!("{} [lang={lang} dir={direction}]\n", bank.name);

    for page in &bank.pages {
        let title = get_localized_text(page, "title", Some(lang)).unwrap_or(&page.title);
        out.push_str(&format!("\n== {title} ==\n"));
        if let Some(description) = get_localized_text(page, "description", Some(lang)) {
            out.push_str(&format!("{description}\n"));
        }
        let on_page = bank
            .questions
            .iter()
            .filter(|q| q.page.as_deref() == Some(page.id.as_str()));
        for question in on_page {
            render_question(&mut out, question, lang);
        }
    }

    let loose: Vec<&Question> = bank
        .questions
        .iter()
        .filter(|q| q.page.as_deref().and_then(|p| bank.page(p)).is_none())
        .collect();
    if !loose.is_empty() {
        out.push_str("\n== - ==\n");
        for question in loose {
            render_question(&mut out, question, lang);
        }
    }

    out
}

fn render_question(out: &mut String, question: &Question, lang: &str) {
    let text = get_localized_text(question, "question_text", Some(lang)).unwrap_or(&question.text);
    out.push_str(&format!("[{}] ({}) {text}\n", question.id, question.question_type));

    let options = get_localized_json(question, "mcq_options", Some(lang))
        .or_else(|| get_localized_json(question, "ordering_options", Some(lang)));
    if let Some(Value::Array(labels)) = options {
        for (i, label) in labels.iter().enumerate() {
            let label = match label.as_str() {
                Some(text) => text.to_string(),
                None => label.to_string(),
            };
            out.push_str(&format!("    {}. {label}\n", i + 1));
        }
    }
}
