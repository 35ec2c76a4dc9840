//! The `traitscore init` command.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use traitscore_core::model::{Answer, AnswerValue, QuestionBank, QuestionType, ResponseSession};

pub fn execute() -> Result<()> {
    // Create traitscore.toml
    if Path::new("traitscore.toml").exists() {
        println!("traitscore.toml already exists, skipping.");
    } else {
        std::fs::write("traitscore.toml", SAMPLE_CONFIG)?;
        println!("Created traitscore.toml");
    }

    // Create sample bank
    std::fs::create_dir_all("banks")?;
    let bank_path = Path::new("banks/sample.toml");
    if bank_path.exists() {
        println!("banks/sample.toml already exists, skipping.");
    } else {
        std::fs::write(bank_path, SAMPLE_BANK)?;
        println!("Created banks/sample.toml");
    }

    // Create a completed session answering every sample question
    std::fs::create_dir_all("sessions")?;
    let session_path = Path::new("sessions/sample.json");
    if session_path.exists() {
        println!("sessions/sample.json already exists, skipping.");
    } else {
        let bank = traitscore_core::parser::parse_bank_str(SAMPLE_BANK, bank_path)?;
        let session = sample_session(&bank)?;
        std::fs::write(session_path, serde_json::to_string_pretty(&session)?)
            .context("failed to write sample session")?;
        println!("Created sessions/sample.json");
    }

    println!("\nNext steps:");
    println!("  1. Run: traitscore validate --bank banks/sample.toml");
    println!("  2. Run: traitscore show --bank banks/sample.toml --lang ar");
    println!("  3. Run: traitscore score --bank banks/sample.toml --session sessions/sample.json");

    Ok(())
}

/// A completed session with a plausible answer to every question in `bank`.
fn sample_session(bank: &QuestionBank) -> Result<ResponseSession> {
    let started = Utc::now();
    let mut session = ResponseSession::new(Uuid::new_v4().to_string(), started);
    session.language = Some("en".into());

    for (i, question) in bank.questions.iter().enumerate() {
        let value = match question.question_type {
            QuestionType::Likert | QuestionType::Slider => {
                let bounds = question
                    .bounds
                    .with_context(|| format!("sample question {} has no bounds", question.id))?;
                let step = bounds.span() / 4.0;
                AnswerValue::Numeric(bounds.min + step * (i % 5) as f64)
            }
            QuestionType::ForcedChoice => AnswerValue::Choice(i % 2),
            QuestionType::Mcq => AnswerValue::Choice(1),
            QuestionType::Ordering => {
                let mut order: Vec<usize> = (0..question.options.len()).collect();
                let len = order.len();
                order.rotate_left(3.min(len));
                AnswerValue::Order(order)
            }
            QuestionType::Essay => AnswerValue::Text("I like building things.".into()),
        };
        session.record_answer(Answer::new(question.id.clone(), value, started))?;
    }

    session.complete(started + chrono::Duration::minutes(15))?;
    Ok(session)
}

const SAMPLE_CONFIG: &str = r#"# traitscore configuration

default_language = "en"
parallelism = 4
output_dir = "./traitscore-results"
# three_band (Low / Moderate / High) or four_band (Low / Medium / High / Very High)
interpretation = "three_band"
"#;

const SAMPLE_BANK: &str = r#"[bank]
id = "sample"
name = "Sample Career Assessment"
description = "Interests, personality, and work rhythm in one short bank"

[[instruments]]
instrument = "riasec"
policy = "weighted_composite"
working_scale = 4
traits = ["R", "I", "A", "S", "E", "C"]

[[instruments]]
instrument = "big_five"
policy = "mean_scaled"
working_scale = 4
traits = ["O", "C", "E", "A", "N"]

[[instruments]]
instrument = "work_rhythm"
policy = "mean_scaled"
working_scale = 4
traits = ["pace", "structure"]
interpretation = "four_band"

[[pages]]
id = "about"
title = "About you"
title_ar = "معلومات عنك"

[[pages]]
id = "interests"
title = "Interests"
title_ar = "الاهتمامات"
description = "How much would you enjoy each activity?"
description_ar = "إلى أي مدى ستستمتع بكل نشاط؟"

[[pages]]
id = "personality"
title = "Personality"
title_ar = "الشخصية"

[[pages]]
id = "rhythm"
title = "Work rhythm"
title_ar = "إيقاع العمل"

[[questions]]
id = "grade"
page = "about"
type = "mcq"
text = "Which grade are you in?"
text_ar = "في أي صف أنت؟"
options = ["9", "10", "11", "12"]
options_ar = ["٩", "١٠", "١١", "١٢"]

[[questions]]
id = "riasec_r"
page = "interests"
instrument = "riasec"
type = "likert"
trait = "R"
reverse_keyed = false
min = 1
max = 5
text = "Repairing a bicycle or an engine"
text_ar = "إصلاح دراجة أو محرك"

[[questions]]
id = "riasec_i"
page = "interests"
instrument = "riasec"
type = "likert"
trait = "I"
reverse_keyed = false
min = 1
max = 5
text = "Running a science experiment"
text_ar = "إجراء تجربة علمية"

[[questions]]
id = "riasec_a"
page = "interests"
instrument = "riasec"
type = "likert"
trait = "A"
reverse_keyed = false
min = 1
max = 5
text = "Designing a poster or a logo"
text_ar = "تصميم ملصق أو شعار"

[[questions]]
id = "riasec_s"
page = "interests"
instrument = "riasec"
type = "likert"
trait = "S"
reverse_keyed = false
min = 1
max = 5
text = "Helping a classmate understand a lesson"
text_ar = "مساعدة زميل على فهم درس"

[[questions]]
id = "riasec_e"
page = "interests"
instrument = "riasec"
type = "likert"
trait = "E"
reverse_keyed = false
min = 1
max = 5
text = "Leading a team project"
text_ar = "قيادة مشروع جماعي"

[[questions]]
id = "riasec_c"
page = "interests"
instrument = "riasec"
type = "likert"
trait = "C"
reverse_keyed = false
min = 1
max = 5
text = "Keeping records organised in a spreadsheet"
text_ar = "تنظيم السجلات في جدول بيانات"

[[questions]]
id = "riasec_fc_ri"
page = "interests"
instrument = "riasec"
type = "forced_choice"
text = "Which would you rather do?"
text_ar = "ماذا تفضل أن تفعل؟"
options = [
    { label = "Build a robot", weights = { R = 2 } },
    { label = "Study how the brain works", weights = { I = 2 } },
]
options_ar = ["بناء روبوت", "دراسة كيفية عمل الدماغ"]

[[questions]]
id = "riasec_fc_as"
page = "interests"
instrument = "riasec"
type = "forced_choice"
text = "Which would you rather do?"
text_ar = "ماذا تفضل أن تفعل؟"
options = [
    { label = "Write a short story", weights = { A = 2 } },
    { label = "Volunteer at a hospital", weights = { S = 2 } },
]
options_ar = ["كتابة قصة قصيرة", "التطوع في مستشفى"]

[[questions]]
id = "riasec_fc_ec"
page = "interests"
instrument = "riasec"
type = "forced_choice"
text = "Which would you rather do?"
text_ar = "ماذا تفضل أن تفعل؟"
options = [
    { label = "Start a small business", weights = { E = 2 } },
    { label = "Manage a budget", weights = { C = 2 } },
]
options_ar = ["بدء مشروع صغير", "إدارة ميزانية"]

[[questions]]
id = "riasec_rank"
page = "interests"
instrument = "riasec"
type = "ordering"
text = "Rank these places to work, favourite first"
text_ar = "رتب أماكن العمل هذه، الأفضل أولا"
options = [
    { label = "Workshop", trait = "R" },
    { label = "Laboratory", trait = "I" },
    { label = "Studio", trait = "A" },
    { label = "Classroom", trait = "S" },
    { label = "Boardroom", trait = "E" },
    { label = "Office", trait = "C" },
]
options_ar = ["ورشة", "مختبر", "استوديو", "فصل دراسي", "قاعة اجتماعات", "مكتب"]

[[questions]]
id = "b5_o1"
page = "personality"
instrument = "big_five"
type = "likert"
trait = "O"
reverse_keyed = false
min = 1
max = 5
text = "I enjoy trying new ideas"
text_ar = "أستمتع بتجربة أفكار جديدة"

[[questions]]
id = "b5_o2"
page = "personality"
instrument = "big_five"
type = "likert"
trait = "O"
reverse_keyed = true
min = 1
max = 5
text = "I prefer doing things the usual way"
text_ar = "أفضل القيام بالأشياء بالطريقة المعتادة"

[[questions]]
id = "b5_c1"
page = "personality"
instrument = "big_five"
type = "likert"
trait = "C"
reverse_keyed = false
min = 1
max = 5
text = "I finish my homework on time"
text_ar = "أنهي واجباتي في الوقت المحدد"

[[questions]]
id = "b5_c2"
page = "personality"
instrument = "big_five"
type = "likert"
trait = "C"
reverse_keyed = true
min = 1
max = 5
text = "I often leave things until the last minute"
text_ar = "كثيرا ما أؤجل الأشياء إلى اللحظة الأخيرة"

[[questions]]
id = "b5_e1"
page = "personality"
instrument = "big_five"
type = "likert"
trait = "E"
reverse_keyed = false
min = 1
max = 5
text = "I like meeting new people"
text_ar = "أحب التعرف على أشخاص جدد"

[[questions]]
id = "b5_e2"
page = "personality"
instrument = "big_five"
type = "likert"
trait = "E"
reverse_keyed = true
min = 1
max = 5
text = "I prefer to stay in the background"
text_ar = "أفضل البقاء بعيدا عن الأضواء"

[[questions]]
id = "b5_a1"
page = "personality"
instrument = "big_five"
type = "likert"
trait = "A"
reverse_keyed = false
min = 1
max = 5
text = "I try to be kind to everyone"
text_ar = "أحاول أن أكون لطيفا مع الجميع"

[[questions]]
id = "b5_a2"
page = "personality"
instrument = "big_five"
type = "likert"
trait = "A"
reverse_keyed = true
min = 1
max = 5
text = "I argue a lot"
text_ar = "أجادل كثيرا"

[[questions]]
id = "b5_n1"
page = "personality"
instrument = "big_five"
type = "likert"
trait = "N"
reverse_keyed = false
min = 1
max = 5
text = "I worry about small things"
text_ar = "أقلق بشأن الأشياء الصغيرة"

[[questions]]
id = "b5_n2"
page = "personality"
instrument = "big_five"
type = "likert"
trait = "N"
reverse_keyed = true
min = 1
max = 5
text = "I stay calm under pressure"
text_ar = "أبقى هادئا تحت الضغط"

[[questions]]
id = "wr_pace1"
page = "rhythm"
instrument = "work_rhythm"
type = "slider"
trait = "pace"
reverse_keyed = false
min = 0
max = 10
text = "I like to work quickly"
text_ar = "أحب أن أعمل بسرعة"

[[questions]]
id = "wr_pace2"
page = "rhythm"
instrument = "work_rhythm"
type = "slider"
trait = "pace"
reverse_keyed = true
min = 0
max = 10
text = "I need plenty of time to finish a task"
text_ar = "أحتاج إلى وقت كاف لإنهاء المهمة"

[[questions]]
id = "wr_structure1"
page = "rhythm"
instrument = "work_rhythm"
type = "slider"
trait = "structure"
reverse_keyed = false
min = 0
max = 10
text = "I plan my day in advance"
text_ar = "أخطط ليومي مسبقا"

[[questions]]
id = "wr_structure2"
page = "rhythm"
instrument = "work_rhythm"
type = "slider"
trait = "structure"
reverse_keyed = true
min = 0
max = 10
text = "I decide what to do as I go"
text_ar = "أقرر ما أفعله أثناء العمل"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use traitscore_core::engine::ScoringEngine;
    use traitscore_core::model::Instrument;

    #[test]
    fn sample_bank_is_clean_and_scores_completely() {
        let bank =
            traitscore_core::parser::parse_bank_str(SAMPLE_BANK, Path::new("sample.toml")).unwrap();
        assert!(traitscore_core::parser::validate_bank(&bank).is_empty());

        let session = sample_session(&bank).unwrap();
        let record = ScoringEngine::new(bank).unwrap().score(&session).unwrap();
        for instrument in Instrument::ALL {
            assert!(record.is_complete(instrument), "{instrument} incomplete");
        }
        assert_eq!(record.profile_code().map(str::len), Some(3));
    }

    #[test]
    fn sample_config_parses() {
        let config = traitscore_core::config::parse_config_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.parallelism, 4);
    }
}
