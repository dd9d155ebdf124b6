use cli_table::{format::Justify, Table};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Households {
    #[serde(default)]
    pub households: Vec<Household>,
}

#[derive(Debug, Clone, Deserialize, Table)]
pub struct Household {
    #[table(title = "Household ID")]
    pub id: String,
    #[serde(default)]
    #[table(title = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Table)]
pub struct Group {
    #[table(title = "Name")]
    pub name: String,
    #[table(title = "Group ID")]
    pub id: String,
    #[serde(rename = "playerIds", default)]
    #[table(title = "Players", justify = "Justify::Right", display_fn = "render_count")]
    pub player_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Groups {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub players: Vec<Player>,
}

impl Groups {
    pub fn player_id(&self, name: &str) -> Option<&str> {
        self.players
            .iter()
            .find(|player| player.name == name)
            .map(|player| player.id.as_str())
    }

    /// The group currently containing the named player.
    pub fn group_for_player(&self, name: &str) -> Option<&Group> {
        let player_id = self.player_id(name)?;

        self.groups
            .iter()
            .find(|group| group.player_ids.iter().any(|id| id == player_id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Favorite {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Favorites {
    #[serde(default)]
    pub items: Vec<Favorite>,
}

/// `createGroup` answers with `{"group": {...}}`, older API versions with the group itself.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CreatedGroup {
    Wrapped { group: GroupRef },
    Bare(GroupRef),
    Unknown(serde_json::Value),
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupRef {
    pub id: String,
}

impl CreatedGroup {
    pub fn into_id(self) -> Option<String> {
        match self {
            CreatedGroup::Wrapped { group } => Some(group.id),
            CreatedGroup::Bare(group) => Some(group.id),
            CreatedGroup::Unknown(_) => None,
        }
    }
}

fn render_count(ids: &[String]) -> String {
    ids.len().to_string()
}
