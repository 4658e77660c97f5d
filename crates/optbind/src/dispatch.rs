//! Subcommand resolution.

use crate::error::ConfigError;
use crate::registry::{Command, CommandId};

/// The child of `scope` that `raw` names, matching a command name before any alias.
pub(crate) fn resolve_child(commands: &[Command], scope: CommandId, raw: &str) -> Option<CommandId> {
    let children = &commands[scope.0].children;
    if let Some(&id) = children.iter().find(|id| commands[id.0].name == raw) {
        return Some(id);
    }
    children
        .iter()
        .copied()
        .find(|id| commands[id.0].aliases.iter().any(|a| a == raw))
}

/// Reject a command name or alias that collides with a sibling's name or alias.
pub(crate) fn check_new_name(
    commands: &[Command],
    parent: CommandId,
    name: &str,
) -> Result<(), ConfigError> {
    if name.is_empty() || name.starts_with('-') || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidName {
            name: name.to_string(),
            reason: "command names must be non-empty, without whitespace or a leading '-'",
        });
    }

    for id in &commands[parent.0].children {
        let sibling = &commands[id.0];
        if sibling.name == name {
            return Err(ConfigError::DuplicateCommand {
                parent: commands[parent.0].name.clone(),
                name: name.to_string(),
            });
        }
        if sibling.aliases.iter().any(|a| a == name) {
            return Err(ConfigError::AliasConflict {
                alias: name.to_string(),
                first: sibling.name.clone(),
                second: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::registry::Registry;

    #[test]
    fn resolves_names_and_aliases() {
        let mut reg = Registry::new("git");
        let commit = reg.add_command(reg.root(), "commit").unwrap();
        reg.add_alias(commit, "ci").unwrap();
        let checkout = reg.add_command(reg.root(), "checkout").unwrap();
        reg.add_alias(checkout, "co").unwrap();

        let root = reg.root();
        assert_eq!(super::resolve_child(&reg.commands, root, "ci"), Some(commit));
        assert_eq!(super::resolve_child(&reg.commands, root, "checkout"), Some(checkout));
        assert_eq!(super::resolve_child(&reg.commands, root, "push"), None);
        assert_eq!(super::resolve_child(&reg.commands, checkout, "ci"), None);
    }

    #[test]
    fn rejects_malformed_command_names() {
        let mut reg = Registry::new("git");
        assert!(reg.add_command(reg.root(), "").is_err());
        assert!(reg.add_command(reg.root(), "--all").is_err());
        assert!(reg.add_command(reg.root(), "two words").is_err());
    }
}
