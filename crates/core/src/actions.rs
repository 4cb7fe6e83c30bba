use serde::{Deserialize, Serialize};

use crate::flows::Role;

/// The closed set of actions a model may propose during a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    MenuLookup,
    OffTopic,
    SaveReport,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [Self::MenuLookup, Self::OffTopic, Self::SaveReport];

    /// Wire name declared to the chat model.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MenuLookup => "consultar_menu_y_horarios",
            Self::OffTopic => "off_topic_tool",
            Self::SaveReport => "guardar_informe_en_notion",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn allowed_for(&self, role: Role) -> bool {
        allowed_tools(role).contains(self)
    }
}

/// Role allow-lists. The expert answers and deflects; only the summarizer files reports.
pub fn allowed_tools(role: Role) -> &'static [ToolKind] {
    match role {
        Role::Expert => &[ToolKind::MenuLookup, ToolKind::OffTopic],
        Role::Summarizer => &[ToolKind::SaveReport],
    }
}

#[cfg(test)]
mod tests {
    use super::{allowed_tools, ToolKind};
    use crate::flows::Role;

    #[test]
    fn names_round_trip_through_lookup() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("borrar_base_de_datos"), None);
        assert_eq!(ToolKind::from_name("Off_Topic_Tool"), None);
    }

    #[test]
    fn allow_lists_do_not_overlap() {
        assert!(ToolKind::MenuLookup.allowed_for(Role::Expert));
        assert!(ToolKind::OffTopic.allowed_for(Role::Expert));
        assert!(!ToolKind::SaveReport.allowed_for(Role::Expert));

        assert_eq!(allowed_tools(Role::Summarizer), &[ToolKind::SaveReport]);
        assert!(!ToolKind::MenuLookup.allowed_for(Role::Summarizer));
    }
}
