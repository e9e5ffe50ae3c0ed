use std::time::Instant;

use vet_ai::embeddings::Embedder;
use vet_ai::retrieve::similarity;
use vet_ai::session::ChatSession;
use vet_core::error::AppError;

/// One evaluation case: a question with the expected emergency flag and a
/// reference answer for semantic-similarity scoring.
pub struct EvalCase {
    pub question: &'static str,
    pub expected_emergency: bool,
    pub expected_answer: &'static str,
}

pub fn builtin_cases() -> Vec<EvalCase> {
    vec![
        EvalCase {
            question: "My cat is vomiting and has diarrhea. What should I do?",
            expected_emergency: true,
            expected_answer:
                "This is an emergency condition. You must take your cat to a veterinarian immediately.",
        },
        EvalCase {
            question: "How often should I feed my dog?",
            expected_emergency: false,
            expected_answer: "Adult dogs are typically fed twice a day.",
        },
        EvalCase {
            question: "My puppy ate chocolate. What should I do?",
            expected_emergency: true,
            expected_answer: "Chocolate ingestion is toxic and requires immediate veterinary care.",
        },
    ]
}

pub struct EvalReport {
    pub cases: u32,
    pub emergency_accuracy_pct: f64,
    pub avg_similarity_pct: f64,
    pub avg_latency_secs: f64,
}

fn answer_similarity_pct(
    session: &ChatSession,
    actual: &str,
    expected: &str,
) -> Result<f64, AppError> {
    let model = &session.config().embedding_model;
    let av = session.embedder().embed(model, actual)?;
    let ev = session.embedder().embed(model, expected)?;
    let an = similarity::l2_norm(&av);
    let en = similarity::l2_norm(&ev);
    if an == 0.0 || en == 0.0 || av.len() != ev.len() {
        return Ok(0.0);
    }
    Ok(similarity::cosine_similarity(&av, &ev, an, en) as f64 * 100.0)
}

/// Run every case through the session, printing per-case results and
/// returning the aggregate report.
pub fn run_eval(session: &ChatSession) -> Result<EvalReport, AppError> {
    let cases = builtin_cases();
    let mut emergency_correct = 0u32;
    let mut similarity_sum = 0.0f64;
    let mut latency_sum = 0.0f64;

    for (idx, case) in cases.iter().enumerate() {
        println!("\nCase {}/{}: {}", idx + 1, cases.len(), case.question);

        let start = Instant::now();
        let output = session.chat(case.question)?;
        let latency = start.elapsed().as_secs_f64();
        latency_sum += latency;

        if output.is_emergency == case.expected_emergency {
            emergency_correct += 1;
        }

        let sim = answer_similarity_pct(session, &output.answer, case.expected_answer)?;
        similarity_sum += sim;

        println!(
            "  emergency: got={} expected={}",
            output.is_emergency, case.expected_emergency
        );
        println!("  answer similarity: {sim:.2}%");
        println!("  latency: {latency:.2}s");
    }

    let n = cases.len() as f64;
    Ok(EvalReport {
        cases: cases.len() as u32,
        emergency_accuracy_pct: emergency_correct as f64 / n * 100.0,
        avg_similarity_pct: similarity_sum / n,
        avg_latency_secs: latency_sum / n,
    })
}

pub fn print_report(report: &EvalReport) {
    println!("\n==================================================");
    println!("                EVALUATION REPORT");
    println!("==================================================");
    println!("Cases run:                {}", report.cases);
    println!(
        "Emergency classification: {:.2}%",
        report.emergency_accuracy_pct
    );
    println!("Answer similarity:        {:.2}%", report.avg_similarity_pct);
    println!("Average response time:    {:.2}s", report.avg_latency_secs);
    println!("==================================================");
}
