//! Реестр подтверждений "вы уверены?" и общий путь их разрешения.

use thiserror::Error;

use crate::handlers::callbacks::tags;
use crate::handlers::utils::{bold, escape_markdown_v2, inline};
use crate::handlers::{commands, portfolios, Ctx, DialogError, HandlerResult, Reply};
use crate::models::{DialogState, UserSession};
use crate::transport::Button;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfirmAction {
    RenamePortfolio,
    DeletePortfolio,
    ChangeDefaultPortfolio,
    DeleteTransaction,
}

#[derive(Debug)]
pub struct ConfirmationTemplate {
    pub action: ConfirmAction,
    pub name: &'static str,
    /// Текст с позиционными `{}`, аргументы экранируются при подстановке
    pub prompt: &'static str,
    pub confirm_label: &'static str,
    pub confirm_tag: &'static str,
    pub cancel_label: &'static str,
    pub cancel_tag: &'static str,
    pub awaiting_state: DialogState,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template '{template}' expects {expected} arguments, got {got}")]
    ArgumentCount {
        template: &'static str,
        expected: usize,
        got: usize,
    },
}

pub static TEMPLATES: [ConfirmationTemplate; 4] = [
    ConfirmationTemplate {
        action: ConfirmAction::RenamePortfolio,
        name: "rename_portfolio",
        prompt: "Are you sure you want to rename portfolio *'{}'* to *'{}'*?",
        confirm_label: "✅ Yes, rename",
        confirm_tag: "confirm_portfolio_rename",
        cancel_label: "❌ Cancel",
        cancel_tag: tags::CANCEL_ACTION,
        awaiting_state: DialogState::WaitingRenamePortfolioDecision,
    },
    ConfirmationTemplate {
        action: ConfirmAction::DeletePortfolio,
        name: "delete_portfolio",
        prompt: "Are you sure? This will permanently delete the portfolio *'{}'* and its transactions\\.",
        confirm_label: "🗑 Yes, delete",
        confirm_tag: "confirm_portfolio_deletion",
        cancel_label: "❌ Cancel",
        cancel_tag: tags::CANCEL_ACTION,
        awaiting_state: DialogState::WaitingDeletePortfolioDecision,
    },
    ConfirmationTemplate {
        action: ConfirmAction::ChangeDefaultPortfolio,
        name: "change_default_portfolio",
        prompt: "Are you sure you want to set *'{}'* as *default* portfolio?",
        confirm_label: "✅ Yes, change default",
        confirm_tag: "confirm_portfolio_change_default",
        cancel_label: "❌ Cancel",
        cancel_tag: tags::CANCEL_ACTION,
        awaiting_state: DialogState::WaitingChangeDefaultPortfolioDecision,
    },
    ConfirmationTemplate {
        action: ConfirmAction::DeleteTransaction,
        name: "delete_transaction",
        prompt: "Are you sure you want to delete this transaction?\n\n{}",
        confirm_label: "🗑 Yes, delete",
        confirm_tag: "confirm_transaction_deletion",
        cancel_label: "🔙 Back",
        cancel_tag: tags::CANCEL_ACTION,
        awaiting_state: DialogState::WaitingDeleteTransactionDecision,
    },
];

impl PartialEq for ConfirmationTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.action == other.action
    }
}

impl ConfirmationTemplate {
    pub fn placeholders(&self) -> usize {
        self.prompt.matches("{}").count()
    }

    pub fn render(&self, args: &[&str]) -> Result<String, TemplateError> {
        let expected = self.placeholders();
        if expected != args.len() {
            return Err(TemplateError::ArgumentCount {
                template: self.name,
                expected,
                got: args.len(),
            });
        }

        let mut out = String::with_capacity(self.prompt.len() + 32);
        let mut parts = self.prompt.split("{}");
        if let Some(head) = parts.next() {
            out.push_str(head);
        }
        for (arg, part) in args.iter().zip(parts) {
            out.push_str(&escape_markdown_v2(arg));
            out.push_str(part);
        }
        Ok(out)
    }

    pub fn buttons(&self) -> Vec<Button> {
        vec![
            Button::new(self.confirm_label, self.confirm_tag),
            Button::new(self.cancel_label, self.cancel_tag),
        ]
    }
}

pub fn template(action: ConfirmAction) -> &'static ConfirmationTemplate {
    match action {
        ConfirmAction::RenamePortfolio => &TEMPLATES[0],
        ConfirmAction::DeletePortfolio => &TEMPLATES[1],
        ConfirmAction::ChangeDefaultPortfolio => &TEMPLATES[2],
        ConfirmAction::DeleteTransaction => &TEMPLATES[3],
    }
}

pub fn by_name(name: &str) -> Option<&'static ConfirmationTemplate> {
    TEMPLATES.iter().find(|t| t.name == name)
}

pub fn by_confirm_tag(tag: &str) -> Option<&'static ConfirmationTemplate> {
    TEMPLATES.iter().find(|t| t.confirm_tag == tag)
}

/// Показывает подтверждение и переводит сессию в состояние ожидания решения
pub fn ask(session: &mut UserSession, action: ConfirmAction, args: &[&str]) -> HandlerResult {
    let template = template(action);
    let text = template.render(args)?;
    session.state = template.awaiting_state;
    Ok(Reply::prompt(
        format!("❓ {}", text),
        inline(vec![template.buttons()]),
    ))
}

/// Нажатие "подтвердить": выполняет действие, если сессия ждёт именно его
pub async fn resolve(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    template: &'static ConfirmationTemplate,
) -> HandlerResult {
    if session.state != template.awaiting_state {
        log::info!(
            "⏭ Outdated confirmation '{}' from user {} in state {}",
            template.confirm_tag,
            ctx.user.id,
            session.state
        );
        return Ok(commands::outdated_button(session));
    }

    let user_id = ctx.user_id().await?;
    let done = match template.action {
        ConfirmAction::RenamePortfolio => {
            let old = session
                .selected_portfolio_name
                .clone()
                .ok_or_else(|| DialogError::missing("selected portfolio"))?;
            let new = session
                .temp_portfolio_name
                .clone()
                .ok_or_else(|| DialogError::missing("new portfolio name"))?;
            ctx.db().rename_portfolio(user_id, &old, &new).await?;
            format!("✅ Portfolio renamed to {}\\.", bold(&new))
        }
        ConfirmAction::DeletePortfolio => {
            let name = session
                .selected_portfolio_name
                .clone()
                .ok_or_else(|| DialogError::missing("selected portfolio"))?;
            // Портфель мог стать основным после первого нажатия
            let default = ctx.db().default_portfolio(user_id).await?;
            if default.is_some_and(|p| p.name == name) {
                session.reset(DialogState::MainMenu);
                return Ok(portfolios::default_not_deletable(&name));
            }
            ctx.db().delete_portfolio(user_id, &name).await?;
            format!("🗑 Portfolio {} deleted\\.", bold(&name))
        }
        ConfirmAction::ChangeDefaultPortfolio => {
            let name = session
                .selected_portfolio_name
                .clone()
                .ok_or_else(|| DialogError::missing("selected portfolio"))?;
            ctx.db().change_default_portfolio(user_id, &name).await?;
            format!("⭐ {} is now your default portfolio\\.", bold(&name))
        }
        ConfirmAction::DeleteTransaction => {
            let tx_id = session
                .pending_tx_id
                .ok_or_else(|| DialogError::missing("pending transaction"))?;
            ctx.db().delete_transaction(user_id, tx_id).await?;
            "🗑 Transaction deleted\\.".to_string()
        }
    };

    log::info!("✅ User {} confirmed {}", ctx.user.id, template.name);
    Ok(commands::finish_flow(Some(done)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_action_has_a_template() {
        for action in [
            ConfirmAction::RenamePortfolio,
            ConfirmAction::DeletePortfolio,
            ConfirmAction::ChangeDefaultPortfolio,
            ConfirmAction::DeleteTransaction,
        ] {
            assert_eq!(template(action).action, action);
        }
    }

    #[test]
    fn tags_and_states_are_unique() {
        let tags: HashSet<_> = TEMPLATES.iter().map(|t| t.confirm_tag).collect();
        let states: HashSet<_> = TEMPLATES.iter().map(|t| t.awaiting_state).collect();
        assert_eq!(tags.len(), TEMPLATES.len());
        assert_eq!(states.len(), TEMPLATES.len());
    }

    #[test]
    fn render_substitutes_and_escapes() {
        let text = template(ConfirmAction::RenamePortfolio)
            .render(&["old_one", "new.one"])
            .unwrap();
        assert_eq!(
            text,
            "Are you sure you want to rename portfolio *'old\\_one'* to *'new\\.one'*?"
        );
    }

    #[test]
    fn render_rejects_wrong_arity() {
        let err = template(ConfirmAction::DeletePortfolio).render(&[]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::ArgumentCount {
                template: "delete_portfolio",
                expected: 1,
                got: 0
            }
        );
    }

    #[test]
    fn lookup_by_name_and_tag() {
        assert_eq!(
            by_name("change_default_portfolio").map(|t| t.action),
            Some(ConfirmAction::ChangeDefaultPortfolio)
        );
        assert!(by_name("launch_rockets").is_none());
        assert_eq!(
            by_confirm_tag("confirm_portfolio_deletion").map(|t| t.awaiting_state),
            Some(DialogState::WaitingDeletePortfolioDecision)
        );
    }

    #[test]
    fn ask_moves_session_to_awaiting_state() {
        let mut session = UserSession::new();
        let reply = ask(&mut session, ConfirmAction::ChangeDefaultPortfolio, &["main"]).unwrap();
        assert_eq!(session.state, DialogState::WaitingChangeDefaultPortfolioDecision);
        assert_eq!(reply.effects.len(), 1);
    }
}
