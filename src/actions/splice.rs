use serde_json::Value;

fn is_control(element: &Value, action_id: &str, value: &str) -> bool {
    element.get("action_id").and_then(Value::as_str) == Some(action_id)
        && element.get("value").and_then(Value::as_str) == Some(value)
}

/// Position of control `(action_id, value)` as (block, element) indices.
fn find_control(blocks: &[Value], action_id: &str, value: &str) -> Option<(usize, usize)> {
    blocks.iter().enumerate().find_map(|(index, block)| {
        if block.get("type").and_then(Value::as_str) != Some("actions") {
            return None;
        }
        block
            .get("elements")?
            .as_array()?
            .iter()
            .position(|element| is_control(element, action_id, value))
            .map(|element_index| (index, element_index))
    })
}

/// Whether any actions block in `blocks` holds control `(action_id, value)`.
pub fn has_control(blocks: &[Value], action_id: &str, value: &str) -> bool {
    find_control(blocks, action_id, value).is_some()
}

/// Replaces the actions block holding control `(action_id, value)` with
/// `replacement`.
///
/// Works on the client-supplied JSON so blocks the platform decorated pass
/// through untouched. Other controls of the matched block are kept in a
/// copy of that block right after the replacement. Returns `None` when no
/// actions block holds the control.
pub fn splice(blocks: &[Value], action_id: &str, value: &str, replacement: Value) -> Option<Vec<Value>> {
    let (index, element_index) = find_control(blocks, action_id, value)?;

    let mut spliced = Vec::with_capacity(blocks.len() + 1);
    spliced.extend_from_slice(&blocks[..index]);
    spliced.push(replacement);

    let mut remainder = blocks[index].clone();
    if let Some(elements) = remainder.get_mut("elements").and_then(Value::as_array_mut) {
        elements.remove(element_index);
        if !elements.is_empty() {
            spliced.push(remainder);
        }
    }

    spliced.extend_from_slice(&blocks[index + 1..]);
    Some(spliced)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn button(action_id: &str, value: &str) -> Value {
        json!({ "type": "button", "action_id": action_id, "value": value })
    }

    fn message() -> Vec<Value> {
        vec![
            json!({ "type": "header", "block_id": "h" }),
            json!({
                "type": "actions",
                "block_id": "a1",
                "elements": [button("show_log", "1"), button("show_log", "2")]
            }),
            json!({
                "type": "actions",
                "block_id": "a2",
                "elements": [button("show_log", "3")]
            }),
        ]
    }

    #[test]
    fn replaces_sole_control_block() {
        let blocks = message();
        let replacement = json!({ "type": "section", "text": "log 3" });

        let spliced = splice(&blocks, "show_log", "3", replacement.clone()).unwrap();

        assert_eq!(spliced, vec![blocks[0].clone(), blocks[1].clone(), replacement]);
    }

    #[test]
    fn keeps_sibling_controls_after_replacement() {
        let blocks = message();
        let replacement = json!({ "type": "section", "text": "log 1" });

        let spliced = splice(&blocks, "show_log", "1", replacement.clone()).unwrap();

        assert_eq!(spliced.len(), 4);
        assert_eq!(spliced[0], blocks[0]);
        assert_eq!(spliced[1], replacement);
        assert_eq!(
            spliced[2],
            json!({ "type": "actions", "block_id": "a1", "elements": [button("show_log", "2")] })
        );
        assert_eq!(spliced[3], blocks[2]);
    }

    #[test]
    fn requires_exact_action_and_value_match() {
        let blocks = message();

        assert!(splice(&blocks, "show_test_summary", "1", json!({})).is_none());
        assert!(splice(&blocks, "show_log", "4", json!({})).is_none());
    }

    #[test]
    fn has_control_matches_splice() {
        let blocks = message();

        assert!(has_control(&blocks, "show_log", "2"));
        assert!(!has_control(&blocks, "show_log", "9"));
    }

    #[test]
    fn ignores_controls_outside_actions_blocks() {
        let blocks = vec![json!({
            "type": "section",
            "accessory": button("show_log", "1")
        })];

        assert!(splice(&blocks, "show_log", "1", json!({})).is_none());
    }
}
