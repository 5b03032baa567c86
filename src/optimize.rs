//! Prompt assembly under a token budget.
//!
//! [`optimize_prompt`] is a pure function. It scores every reference
//! document against the generation context, packs the highest-priority
//! fragments greedily into whatever budget the base prompts leave over,
//! then splices the winners into the system prompt as a labeled
//! STORY CONTEXT section. The user prompt only gets a short pointer so
//! bulk text is never carried in both channels.

use crate::estimate::estimate_tokens;
use crate::extract::extract_fragments;
use crate::models::{Fragment, GenerationContext, OptimizedPrompt, ReferenceDoc};

/// Appended to the user prompt whenever context was injected.
const USER_POINTER: &str =
    "\n\n(Reference material for this chapter is in the system prompt under STORY CONTEXT.)";

/// Score, rank, and pack reference fragments into the base prompts.
///
/// When nothing fits (no documents, or the base prompts already exhaust
/// `total_budget`) both prompts pass through unchanged. That is silent
/// degradation, not an error.
pub fn optimize_prompt(
    base_system: &str,
    base_user: &str,
    docs: &[ReferenceDoc],
    context: &GenerationContext,
    total_budget: usize,
) -> OptimizedPrompt {
    let base_tokens = estimate_tokens(base_system) + estimate_tokens(base_user);
    let available = total_budget.saturating_sub(base_tokens);

    let mut fragments: Vec<Fragment> = Vec::new();
    for doc in docs {
        fragments.extend(extract_fragments(doc, context));
    }
    // Stable sort keeps encounter order within a priority tier.
    fragments.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut included: Vec<Fragment> = Vec::new();
    let mut used = 0usize;
    for fragment in fragments {
        if used + fragment.tokens <= available {
            used += fragment.tokens;
            included.push(fragment);
        }
    }

    if included.is_empty() {
        return OptimizedPrompt {
            system_prompt: base_system.to_string(),
            user_prompt: base_user.to_string(),
            token_estimate: base_tokens,
            included_sources: Vec::new(),
        };
    }

    let system_prompt = format!("{}{}", base_system, story_context_block(&included, context));
    let user_prompt = format!("{}{}", base_user, USER_POINTER);
    let token_estimate = estimate_tokens(&system_prompt) + estimate_tokens(&user_prompt);
    let included_sources = included.iter().map(|f| f.source.clone()).collect();

    OptimizedPrompt {
        system_prompt,
        user_prompt,
        token_estimate,
        included_sources,
    }
}

fn story_context_block(included: &[Fragment], context: &GenerationContext) -> String {
    let mut block = String::from("\n\n=== STORY CONTEXT ===\n");
    block.push_str(&format!(
        "Genre: {} | Chapter: {} | Stage: {}\n",
        context.genre, context.chapter_number, context.stage
    ));
    for fragment in included {
        block.push_str(&format!("\n[{}]\n{}\n", fragment.source, fragment.text));
    }
    block.push_str(
        "\nUse the story context above to keep characters, world details, and \
         continuity consistent. Do not restate these facts verbatim in the prose.\n\
         === END STORY CONTEXT ===",
    );
    block
}
