use super::{required_str, PlaybookTool};
use playbooks_core::api_key::Permission;
use playbooks_core::canvas::Canvas;
use playbooks_core::playbook::Playbook;
use playbooks_core::Store;
use serde_json::{json, Value};

pub struct ListCanvasTool;

impl PlaybookTool for ListCanvasTool {
    fn name(&self) -> &str {
        "list_canvas"
    }

    fn description(&self) -> &str {
        "List canvas documents with their section outlines"
    }

    fn schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn permission(&self) -> Permission {
        Permission::CanvasRead
    }

    fn call(&self, _args: Value, store: &Store, playbook: &Playbook) -> Result<Value, String> {
        let docs = store
            .list::<Canvas>(playbook.id)
            .map_err(|e| e.to_string())?;
        let outline: Vec<Value> = docs
            .iter()
            .map(|c| {
                json!({
                    "slug": c.slug,
                    "name": c.name,
                    "sections": c.sections.iter().map(|s| json!({
                        "id": s.id,
                        "heading": s.heading,
                        "level": s.level,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        Ok(json!({ "canvas": outline }))
    }
}

pub struct ReadCanvasTool;

impl PlaybookTool for ReadCanvasTool {
    fn name(&self) -> &str {
        "read_canvas"
    }

    fn description(&self) -> &str {
        "Read a canvas document, or one section of it when section_id is given"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "slug": { "type": "string", "description": "Canvas slug" },
                "section_id": { "type": "string", "description": "Optional section id such as s2" }
            },
            "required": ["slug"]
        })
    }

    fn permission(&self) -> Permission {
        Permission::CanvasRead
    }

    fn call(&self, args: Value, store: &Store, playbook: &Playbook) -> Result<Value, String> {
        let slug = required_str(&args, "slug")?;
        let canvas: Canvas = store.get(playbook.id, slug).map_err(|e| e.to_string())?;
        match args["section_id"].as_str() {
            Some(id) => {
                let section = canvas
                    .section(id)
                    .ok_or_else(|| format!("section not found: {id}"))?;
                serde_json::to_value(section).map_err(|e| e.to_string())
            }
            None => serde_json::to_value(&canvas).map_err(|e| e.to_string()),
        }
    }
}

pub struct UpdateCanvasSectionTool;

impl PlaybookTool for UpdateCanvasSectionTool {
    fn name(&self) -> &str {
        "update_canvas_section"
    }

    fn description(&self) -> &str {
        "Replace the body of one canvas section; other sections are left as they are"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "slug": { "type": "string", "description": "Canvas slug" },
                "section_id": { "type": "string", "description": "Section id such as s2" },
                "content": { "type": "string", "description": "New section body (markdown)" }
            },
            "required": ["slug", "section_id", "content"]
        })
    }

    fn permission(&self) -> Permission {
        Permission::CanvasWrite
    }

    fn call(&self, args: Value, store: &Store, playbook: &Playbook) -> Result<Value, String> {
        let slug = required_str(&args, "slug")?;
        let section_id = required_str(&args, "section_id")?;
        let content = args["content"]
            .as_str()
            .ok_or_else(|| "missing required argument: content".to_string())?;
        let mut canvas: Canvas = store.get(playbook.id, slug).map_err(|e| e.to_string())?;
        canvas
            .patch_section(section_id, content)
            .map_err(|e| e.to_string())?;
        store.save(&canvas).map_err(|e| e.to_string())?;
        Ok(json!({
            "slug": canvas.slug,
            "section_id": section_id,
            "sections": canvas.sections.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playbooks_core::canvas::CanvasInput;
    use playbooks_core::playbook::PlaybookInput;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store, Playbook) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("t.redb")).unwrap();
        let pb = Playbook::create(
            "u1",
            PlaybookInput {
                name: Some("Docs".into()),
                ..Default::default()
            },
        )
        .unwrap();
        store.create_playbook(&pb).unwrap();
        let canvas = Canvas::create(
            pb.id,
            CanvasInput {
                name: Some("Plan".into()),
                content: Some("# Goals\nship v1\n\n## Risks\nnone yet".into()),
                ..Default::default()
            },
        )
        .unwrap();
        store.create(&canvas).unwrap();
        (dir, store, pb)
    }

    #[test]
    fn list_shows_section_outline() {
        let (_dir, store, pb) = setup();
        let out = ListCanvasTool.call(Value::Null, &store, &pb).unwrap();
        assert_eq!(out["canvas"][0]["slug"], "plan");
        assert_eq!(out["canvas"][0]["sections"][1]["heading"], "Risks");
        assert_eq!(out["canvas"][0]["sections"][1]["level"], 2);
    }

    #[test]
    fn read_single_section() {
        let (_dir, store, pb) = setup();
        let out = ReadCanvasTool
            .call(json!({ "slug": "plan", "section_id": "s2" }), &store, &pb)
            .unwrap();
        assert_eq!(out["content"], "none yet");
        assert!(ReadCanvasTool
            .call(json!({ "slug": "plan", "section_id": "s9" }), &store, &pb)
            .is_err());
    }

    #[test]
    fn update_section_rewrites_only_that_section() {
        let (_dir, store, pb) = setup();
        UpdateCanvasSectionTool
            .call(
                json!({ "slug": "plan", "section_id": "s2", "content": "vendor lock-in" }),
                &store,
                &pb,
            )
            .unwrap();
        let canvas: Canvas = store.get(pb.id, "plan").unwrap();
        assert_eq!(canvas.sections[0].content, "ship v1");
        assert_eq!(canvas.sections[1].content, "vendor lock-in");
        assert!(canvas.content.contains("## Risks\n\nvendor lock-in"));
    }
}
