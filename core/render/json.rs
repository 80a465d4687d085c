use super::RenderInput;
use crate::classify::Subcategory;
use crate::error::Result;
use crate::summary::Summary;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct JsonDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<JsonMetadata<'a>>,
    repository_structure: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a Summary>,
    files: Vec<JsonFile<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets: Option<Vec<JsonAsset<'a>>>,
}

#[derive(Debug, Serialize)]
struct JsonMetadata<'a> {
    repo_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subdir: Option<&'a str>,
    generated_at: String,
    format: &'static str,
}

#[derive(Debug, Serialize)]
struct JsonFile<'a> {
    file: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    subcategory: Option<Subcategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens_est: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonAsset<'a> {
    file: &'a str,
    #[serde(rename = "type")]
    subcategory: Subcategory,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

pub fn render(input: &RenderInput) -> Result<String> {
    let rich = !input.mode.is_lite();
    let meta = &input.metadata;

    let files = input
        .files
        .iter()
        .map(|f| JsonFile {
            file: &f.relative_path,
            subcategory: rich.then_some(f.subcategory),
            size_bytes: rich.then_some(f.size),
            tokens_est: rich.then_some(f.tokens),
            url: if rich { f.url.as_deref() } else { None },
            content: f.content.trim(),
        })
        .collect();

    let document = JsonDocument {
        metadata: rich.then(|| JsonMetadata {
            repo_name: &meta.name,
            url: meta.url.as_deref(),
            branch: meta.branch.as_deref(),
            subdir: meta.subdir.as_deref(),
            generated_at: meta.generated_at_display(),
            format: "json",
        }),
        repository_structure: &input.tree,
        summary: rich.then_some(&input.summary),
        files,
        assets: rich.then(|| {
            input
                .assets
                .iter()
                .map(|a| JsonAsset {
                    file: &a.relative_path,
                    subcategory: a.subcategory,
                    size_bytes: a.size,
                    url: a.url.as_deref(),
                })
                .collect()
        }),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderMode;
    use crate::render::test_support::sample_input;
    use serde_json::Value;

    #[test]
    fn rich_document_shape() {
        let value: Value = serde_json::from_str(&render(&sample_input(RenderMode::Rich)).unwrap()).unwrap();
        assert_eq!(value["metadata"]["repo_name"], "demo");
        assert_eq!(value["metadata"]["generated_at"], "2024-05-01T12:30:00Z");
        assert!(value["repository_structure"].as_str().unwrap().contains("main.py"));
        assert_eq!(value["summary"]["total_files"], 3);
        assert_eq!(value["summary"]["file_type_breakdown"]["image"], 1);
        assert_eq!(value["files"][0]["file"], "README.md");
        assert_eq!(value["files"][1]["type"], "code");
        assert_eq!(value["files"][1]["content"], "print(1)");
        assert_eq!(value["assets"][0]["file"], "image.png");
        assert!(value["assets"][0].get("content").is_none());
    }

    #[test]
    fn lite_document_is_minimal() {
        let value: Value = serde_json::from_str(&render(&sample_input(RenderMode::Lite)).unwrap()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert!(object.contains_key("repository_structure"));
        assert!(object.contains_key("files"));
        assert_eq!(value["files"][0]["content"], "# Hi");
        assert!(value["files"][0].get("tokens_est").is_none());
    }
}
