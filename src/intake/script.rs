//! Intake script: the static text the desk sends.
//!
//! Built-in content is the Azevedo - Advogados Associados script. A JSON file
//! with the same shape can replace it at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::channels::{MenuEntry, MenuPrompt};
use crate::error::ScriptError;
use crate::intake::router::MenuOption;

/// Placeholder substituted with the ticket id in the opening notice.
pub const TICKET_ID_PLACEHOLDER: &str = "{ticket_id}";

/// Menu row and reply sequence for one intake flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowScript {
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// Sent in order, one message per line.
    pub replies: Vec<String>,
}

/// All customer-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeScript {
    /// Banner shown before the menu to senders outside the flood window.
    pub greeting: String,
    /// Banner shown when a ticket opens. Must contain `{ticket_id}`.
    pub ticket_opened: String,
    pub air_travel: FlowScript,
    pub real_estate: FlowScript,
    pub other: FlowScript,
}

impl IntakeScript {
    /// Load and validate a script from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let script: Self = serde_json::from_str(&raw).map_err(|source| ScriptError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<(), ScriptError> {
        if !self.ticket_opened.contains(TICKET_ID_PLACEHOLDER) {
            return Err(ScriptError::MissingTicketPlaceholder);
        }
        for option in MenuOption::ALL {
            let replies = &self.flow(option).replies;
            if replies.iter().all(|r| r.trim().is_empty()) {
                return Err(ScriptError::EmptySequence {
                    option: option.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn flow(&self, option: MenuOption) -> &FlowScript {
        match option {
            MenuOption::AirTravel => &self.air_travel,
            MenuOption::RealEstate => &self.real_estate,
            MenuOption::Other => &self.other,
        }
    }

    /// The fixed reply sequence for `option`, in send order.
    pub fn replies(&self, option: MenuOption) -> &[String] {
        &self.flow(option).replies
    }

    /// Greeting banner with the option list.
    pub fn greeting_menu(&self) -> MenuPrompt {
        self.menu_with_banner(self.greeting.clone())
    }

    /// Ticket-opened notice with the option list.
    pub fn ticket_notice(&self, ticket_id: &str) -> MenuPrompt {
        self.menu_with_banner(self.ticket_opened.replace(TICKET_ID_PLACEHOLDER, ticket_id))
    }

    fn menu_with_banner(&self, banner: String) -> MenuPrompt {
        let options = MenuOption::ALL
            .into_iter()
            .map(|option| {
                let flow = self.flow(option);
                MenuEntry {
                    label: flow.label.clone(),
                    id: option.token().to_string(),
                    description: flow.description.clone(),
                }
            })
            .collect();
        MenuPrompt { banner, options }
    }
}

impl Default for IntakeScript {
    fn default() -> Self {
        Self {
            greeting: "Olá! 👋 Seja bem-vindo(a) ao Azevedo - Advogados Associados.\n\n\
                       Escolha uma das opções:"
                .into(),
            ticket_opened: "Olá! 👋 Seja bem-vindo(a) ao Azevedo - Advogados Associados.\n\n\
                            🎫 Seu atendimento foi aberto com o protocolo {ticket_id}.\n\n\
                            Escolha uma das opções:"
                .into(),
            air_travel: FlowScript {
                label: "Direito Aéreo".into(),
                description: "Atraso, cancelamento, overbooking ou bagagem".into(),
                replies: vec![
                    "Perfeito! Para que possamos te ajudar da melhor forma com seu problema aéreo, por favor, nos envie as informações que você tem.".into(),
                    "✈️ Especifique o problema: Foi atraso, cancelamento, overbooking, ou extravio/dano de bagagem?".into(),
                    "📝 Detalhe os fatos: Conte-nos o que aconteceu, mesmo que seja por áudio!".into(),
                    "📎 Envie documentos: passagem aérea, comprovantes e quaisquer outras provas.".into(),
                    "👨‍⚖️ Um especialista entrará em contato em breve para analisar seu caso.".into(),
                ],
            },
            real_estate: FlowScript {
                label: "Direito Imobiliário".into(),
                description: "Contratos com construtoras e imóveis".into(),
                replies: vec![
                    "Certo! Para que nosso time de Direito Imobiliário possa te auxiliar:".into(),
                    "📎 Envie o contrato com a construtora.".into(),
                    "📝 Explique o motivo da sua consulta e qual é o problema.".into(),
                    "👨‍⚖️ Um especialista analisará sua demanda e entrará em contato.".into(),
                ],
            },
            other: FlowScript {
                label: "Outros assuntos".into(),
                description: "Demais questões jurídicas".into(),
                replies: vec![
                    "Entendido. Um de nossos atendentes entrará em contato em breve.".into(),
                    "📝 Por favor, descreva brevemente sobre o que você precisa de ajuda.".into(),
                ],
            },
        }
    }
}
