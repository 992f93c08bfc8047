/// Builds the three distinct phase prompts, each embedding the task
/// description. Plan is solicited once; implement/review are re-solicited
/// per iteration but the plan description itself only grows (feedback is
/// appended, never re-solicited).
pub fn plan_prompt(task_description: &str) -> String {
    format!(
        r#"You are the planning phase of an autonomous maintenance run.

## Task
{task_description}

## Output Format
Respond with a single JSON object:
{{
  "steps": ["short ordered step", "..."],
  "files": ["relative/path/touched", "..."],
  "description": "a self-contained description of the plan, including any constraints the implement phase must honor"
}}

Output ONLY the JSON object."#
    )
}

pub fn implement_prompt(plan_description: &str, iteration: u32) -> String {
    format!(
        r#"You are the implement phase of an autonomous maintenance run, iteration {iteration}.

## Plan
{plan_description}

## Output Format
Make the necessary changes in the working directory, then respond with a single JSON object:
{{
  "files_modified": ["relative/path", "..."],
  "summary": "what you changed and why"
}}

Output ONLY the JSON object."#
    )
}

pub fn review_prompt(plan_description: &str, implement_summary: &str, iteration: u32) -> String {
    format!(
        r#"You are the review phase of an autonomous maintenance run, iteration {iteration}.

## Plan
{plan_description}

## Implementation Summary
{implement_summary}

## Output Format
Evaluate whether the implementation satisfies the plan. Respond with a single JSON object:
{{
  "passed": true or false,
  "feedback": "explanation of your evaluation",
  "issues": ["specific issue", "..."]
}}

Output ONLY the JSON object."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_prompt_embeds_task_description() {
        assert!(plan_prompt("backfill missing docs").contains("backfill missing docs"));
    }

    #[test]
    fn implement_prompt_embeds_iteration_number() {
        assert!(implement_prompt("do x", 2).contains("iteration 2"));
    }
}
