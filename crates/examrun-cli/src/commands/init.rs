//! The `examrun init` command.

use std::path::Path;

use anyhow::Result;

use examrun_client::ExamrunConfig;

const CONFIG_HEADER: &str = "# examrun configuration
#
# After a login, store the token and user id under [api] to skip the email
# prompt. `${VAR}` references are resolved from the environment; the
# EXAMRUN_API_URL and EXAMRUN_TOKEN variables override the file.

";

pub fn execute() -> Result<()> {
    let config = ExamrunConfig::default();

    if Path::new("examrun.toml").exists() {
        println!("examrun.toml already exists, skipping.");
    } else {
        std::fs::write("examrun.toml", format!("{CONFIG_HEADER}{}", config.to_toml()?))?;
        println!("Created examrun.toml");
    }

    let data_path = &config.exams_path;
    if data_path.exists() {
        println!("{} already exists, skipping.", data_path.display());
    } else {
        if let Some(dir) = data_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(data_path, SAMPLE_EXAMS)?;
        println!("Created {}", data_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Set [api] base_url in examrun.toml to your backend");
    println!("  2. Run: examrun list --exams {}", data_path.display());
    println!("  3. Run: examrun take --exam-id 1");

    Ok(())
}

const SAMPLE_EXAMS: &str = r#"[
  {
    "id": 1,
    "year_description": "sample",
    "exam_number_description": "연습 문제",
    "level": "TOPIK Ⅰ",
    "skill": "읽기",
    "instruction_groups": [
      {
        "instruction": "[1~2] 무엇에 대한 내용입니까? 알맞은 것을 고르십시오.",
        "questions": [
          {
            "number": 1,
            "content": "사과가 있습니다. 포도도 있습니다.",
            "options": [
              {"text": "요일"},
              {"text": "이름"},
              {"text": "과일", "is_correct": true},
              {"text": "나라"}
            ]
          },
          {
            "number": 2,
            "content": "오늘은 월요일입니다. 내일은 화요일입니다.",
            "options": [
              {"text": "요일", "is_correct": true},
              {"text": "날씨"},
              {"text": "장소"},
              {"text": "계절"}
            ]
          }
        ]
      }
    ]
  }
]
"#;
