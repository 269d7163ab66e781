use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examrun_core::answers::Answers;
use examrun_core::model::ExamDefinition;
use examrun_core::parser::parse_exams_str;
use examrun_core::scoring::{score, CorrectAnswers};

fn generate_exam_json(questions: u32) -> String {
    let items: Vec<String> = (1..=questions)
        .map(|n| {
            let correct = n % 4;
            let options: Vec<String> = (0..4)
                .map(|i| format!(r#"{{"text": "option {i}", "is_correct": {}}}"#, i == correct))
                .collect();
            format!(r#"{{"number": {n}, "options": [{}]}}"#, options.join(","))
        })
        .collect();
    format!(
        r#"[{{"id": "bench", "level": "TOPIK II", "skill": "읽기",
             "instruction_groups": [{{"questions": [{}]}}]}}]"#,
        items.join(",")
    )
}

fn exam(questions: u32) -> ExamDefinition {
    let json = generate_exam_json(questions);
    parse_exams_str(&json, "bench.json".as_ref())
        .expect("bench exam parses")
        .remove(0)
}

fn half_right(questions: u32) -> Answers {
    (1..=questions)
        .map(|n| (n, if n % 2 == 0 { (n % 4) as usize } else { 0 }))
        .collect()
}

fn bench_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");

    for questions in [20, 50, 200] {
        let exam = exam(questions);
        let correct = CorrectAnswers::from_exam(&exam).expect("valid exam");
        let answers = half_right(questions);
        let total = exam.question_count();

        group.bench_function(format!("{questions}_questions"), |b| {
            b.iter(|| score(black_box(&answers), black_box(&correct), black_box(total)))
        });
    }

    group.finish();
}

fn bench_correct_answers(c: &mut Criterion) {
    let mut group = c.benchmark_group("correct_answers");

    for questions in [50, 200] {
        let exam = exam(questions);
        group.bench_function(format!("{questions}_questions"), |b| {
            b.iter(|| CorrectAnswers::from_exam(black_box(&exam)))
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_exams");

    let medium = generate_exam_json(50);
    let large = generate_exam_json(200);

    group.bench_function("50_questions", |b| {
        b.iter(|| parse_exams_str(black_box(&medium), black_box("bench.json".as_ref())))
    });

    group.bench_function("200_questions", |b| {
        b.iter(|| parse_exams_str(black_box(&large), black_box("bench.json".as_ref())))
    });

    group.finish();
}

criterion_group!(benches, bench_score, bench_correct_answers, bench_parse);
criterion_main!(benches);
