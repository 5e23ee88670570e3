//! Simulated world layout from TOML (`[simulation]` section)

use blockhand_domain::{BlockPos, ConfigIssue, Position, Role};
use serde::{Deserialize, Serialize};

/// An additional agent living in the simulated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePeerConfig {
    pub name: String,
    pub role: String,
    pub position: [f64; 3],
    /// Units of the resource the peer starts with
    pub inventory: u32,
}

impl Default for FilePeerConfig {
    fn default() -> Self {
        Self {
            name: "Merchant".to_string(),
            role: "merchant".to_string(),
            position: [3.5, 0.0, 0.5],
            inventory: 0,
        }
    }
}

impl FilePeerConfig {
    pub fn parse_role(&self) -> Role {
        let Ok(role) = self.role.parse::<Role>();
        role
    }

    pub fn spawn_position(&self) -> Position {
        let [x, y, z] = self.position;
        Position::new(x, y, z)
    }
}

/// A tree planted at startup: a column of the resource capped with markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeConfig {
    pub x: i32,
    pub z: i32,
    pub height: i32,
}

impl FileTreeConfig {
    pub fn base(&self) -> BlockPos {
        BlockPos::new(self.x, 0, self.z)
    }
}

/// Raw simulation configuration from TOML
///
/// # Example
///
/// ```toml
/// [simulation]
/// player = "Steve"
/// player_position = [0.5, 0.0, 4.5]
/// agent_position = [0.5, 0.0, 0.5]
/// credits_per_order = 10
///
/// [[simulation.peers]]
/// name = "Merchant"
/// role = "merchant"
/// position = [3.5, 0.0, 0.5]
///
/// [[simulation.trees]]
/// x = 12
/// z = 0
/// height = 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSimulationConfig {
    /// Console lines are spoken by this player
    pub player: String,
    pub player_position: [f64; 3],
    pub agent_position: [f64; 3],
    /// Units of the resource the driven agent starts with
    pub agent_inventory: u32,
    /// Credits granted by each plan order on the local ledger
    pub credits_per_order: u64,
    pub peers: Vec<FilePeerConfig>,
    pub trees: Vec<FileTreeConfig>,
}

impl Default for FileSimulationConfig {
    fn default() -> Self {
        Self {
            player: "Steve".to_string(),
            player_position: [0.5, 0.0, 4.5],
            agent_position: [0.5, 0.0, 0.5],
            agent_inventory: 0,
            credits_per_order: 10,
            peers: vec![FilePeerConfig::default()],
            trees: vec![
                FileTreeConfig { x: 12, z: 0, height: 5 },
                FileTreeConfig { x: 14, z: 8, height: 6 },
                FileTreeConfig { x: -10, z: 12, height: 5 },
            ],
        }
    }
}

impl FileSimulationConfig {
    pub fn player_spawn(&self) -> Position {
        let [x, y, z] = self.player_position;
        Position::new(x, y, z)
    }

    pub fn agent_spawn(&self) -> Position {
        let [x, y, z] = self.agent_position;
        Position::new(x, y, z)
    }

    pub fn validate(&self, agent_name: &str) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.player.trim().is_empty() {
            issues.push(ConfigIssue::empty("simulation.player"));
        }
        for (index, peer) in self.peers.iter().enumerate() {
            if peer.name.trim().is_empty() {
                issues.push(ConfigIssue::empty(&format!("simulation.peers[{index}].name")));
            } else if peer.name.eq_ignore_ascii_case(agent_name)
                || peer.name.eq_ignore_ascii_case(&self.player)
            {
                issues.push(ConfigIssue::out_of_range(
                    &format!("simulation.peers[{index}].name"),
                    &peer.name,
                    "a unique name",
                ));
            }
        }
        for (index, tree) in self.trees.iter().enumerate() {
            if tree.height < 1 {
                issues.push(ConfigIssue::out_of_range(
                    &format!("simulation.trees[{index}].height"),
                    tree.height,
                    1,
                ));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_world_has_a_merchant() {
        let config = FileSimulationConfig::default();
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.peers[0].parse_role(), Role::Merchant);
        assert!(config.validate("Builder").is_empty());
    }

    #[test]
    fn test_simulation_config_deserialize() {
        let toml_str = r#"
[simulation]
player = "Alex"
agent_inventory = 4

[[simulation.peers]]
name = "Trader"
role = "merchant"
inventory = 20

[[simulation.trees]]
x = 5
z = 5
height = 4
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let sim = &config.simulation;
        assert_eq!(sim.player, "Alex");
        assert_eq!(sim.agent_inventory, 4);
        assert_eq!(sim.peers[0].name, "Trader");
        assert_eq!(sim.peers[0].inventory, 20);
        assert_eq!(sim.peers[0].position, [3.5, 0.0, 0.5]);
        assert_eq!(sim.trees, vec![FileTreeConfig { x: 5, z: 5, height: 4 }]);
    }

    #[test]
    fn test_duplicate_peer_name_warns() {
        let config = FileSimulationConfig {
            peers: vec![FilePeerConfig {
                name: "builder".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let issues = config.validate("Builder");
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());
    }
}
