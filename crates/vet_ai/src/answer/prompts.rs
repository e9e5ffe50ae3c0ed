/// Join retrieved documents into one numbered reference block.
pub fn context_block(context_docs: &[String]) -> String {
    context_docs
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("Relevant information {}:\n{}", i + 1, doc))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The fixed single-turn prompt for the generation model.
///
/// The contract is explicit: answer only from the reference block, flag
/// emergencies with the marker, stay concise, and close with the disclaimer.
pub fn assistant_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are a veterinary assistant. Answer using ONLY the reference information below. If the needed information is missing, say so plainly.

Reference information:
{context}

Question: {question}

Instructions:
- If this is an emergency, begin the answer with "{marker}".
- Be concise but thorough.
- End with a reminder to consult a veterinarian if unsure.
Answer:"#,
        context = context,
        question = question,
        marker = super::EMERGENCY_MARKER,
    )
}
