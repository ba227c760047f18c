//! Graph driver: per-turn routing, node sequencing, reducer application.
//!
//! One turn is one traversal from routing to a terminal node. The routing
//! rule is evaluated once at the start of the turn:
//!
//! 1. Empty history and empty message -> greeting (terminal)
//! 2. Tool results present -> tool_handler -> conversation -> finalize
//! 3. Step checkpoint active and non-empty message -> step_confirmation
//!    -> (conversation -> finalize, unless the node answered directly)
//! 4. Pending field and non-empty message -> validate_input ->
//!    conversation -> finalize
//! 5. Extraction not yet done and non-empty message -> extraction ->
//!    (finalize | FORM_COMPLETE shortcut | conversation -> finalize)
//! 6. Otherwise -> conversation -> finalize
//!
//! The caller hands in an owned session copy and commits the returned one
//! only when the turn completes, so cancellation mid-turn discards all
//! partial updates.

use chrono::NaiveDate;
use formpilot_types::action::Action;
use formpilot_types::session::{SessionState, TurnInput};
use tracing::{debug, instrument};

use super::nodes::conversation::conversation_node;
use super::nodes::extraction::extraction_node;
use super::nodes::finalize::finalize_node;
use super::nodes::greeting::greeting_node;
use super::nodes::step_confirmation::step_confirmation_node;
use super::nodes::tool_handler::tool_handler_node;
use super::nodes::validation::validate_input_node;
use super::payload::{ActionPayload, LlmPayload};
use super::state::Turn;
use crate::llm::BoxLlmProvider;

/// Which node a turn enters first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Greeting,
    ToolHandler,
    StepConfirmation,
    ValidateInput,
    Extraction,
    Conversation,
}

/// Evaluate the routing rule against the session and this turn's input.
pub fn route_turn(session: &SessionState, input: &TurnInput) -> Route {
    let message_empty = input.user_message.trim().is_empty();

    if session.conversation_history.is_empty() && message_empty {
        return Route::Greeting;
    }
    if !input.tool_results.is_empty() {
        return Route::ToolHandler;
    }
    if session.awaiting_step_confirmation && !message_empty {
        return Route::StepConfirmation;
    }
    if session.pending_field_id.is_some() && !message_empty {
        return Route::ValidateInput;
    }
    if !session.initial_extraction_done && !message_empty {
        return Route::Extraction;
    }
    Route::Conversation
}

/// Run one conversation turn to completion and return the mutated session
/// together with the emitted action.
#[instrument(skip_all, fields(route))]
pub async fn run_turn(
    llm: &BoxLlmProvider,
    model: &str,
    session: SessionState,
    input: TurnInput,
    today: NaiveDate,
) -> (SessionState, Action) {
    let route = route_turn(&session, &input);
    tracing::Span::current().record("route", format!("{route:?}").as_str());
    debug!(?route, "routing turn");

    let mut turn = Turn::new(session, input.user_message, input.tool_results, today);

    match route {
        Route::Greeting => {
            let update = greeting_node(&turn);
            turn.apply(update);
        }
        Route::ToolHandler => {
            let update = tool_handler_node(&turn);
            turn.apply(update);
            run_conversation_then_finalize(&mut turn, llm, model).await;
        }
        Route::StepConfirmation => {
            let update = step_confirmation_node(&turn);
            turn.apply(update);
            if !turn.skip_conversation_turn {
                run_conversation_then_finalize(&mut turn, llm, model).await;
            }
        }
        Route::ValidateInput => {
            let update = validate_input_node(&turn);
            turn.apply(update);
            run_conversation_then_finalize(&mut turn, llm, model).await;
        }
        Route::Extraction => {
            let update = extraction_node(&turn, llm, model).await;
            turn.apply(update);

            if turn.parsed.is_some() {
                // The LLM pre-empted extraction with a direct action.
                let update = finalize_node(&turn);
                turn.apply(update);
            } else if turn.session.all_required_answered() {
                // Extraction filled everything (or the form never required
                // anything); complete without another LLM round trip.
                turn.parsed = Some(LlmPayload::Action(ActionPayload::completion(Some(
                    "That's everything I needed. Thank you!".to_string(),
                ))));
                let update = finalize_node(&turn);
                turn.apply(update);
            } else {
                run_conversation_then_finalize(&mut turn, llm, model).await;
            }
        }
        Route::Conversation => {
            run_conversation_then_finalize(&mut turn, llm, model).await;
        }
    }

    let action = turn.action.take().unwrap_or_else(|| {
        // Every path above sets an action; this is a belt against a node
        // regression, not a reachable state.
        Action::message("Sorry, something went wrong. Please try again.")
    });

    (turn.session, action)
}

async fn run_conversation_then_finalize(turn: &mut Turn, llm: &BoxLlmProvider, model: &str) {
    let update = conversation_node(turn, llm, model).await;
    turn.apply(update);

    // A failed LLM exchange already set the fallback action; skip finalize.
    if turn.parsed.is_some() {
        let update = finalize_node(turn);
        turn.apply(update);
    }
}
