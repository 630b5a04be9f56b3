use crate::utils::error::ClassifierError;
use crate::Result;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    pub class_id: String,
    pub label: String,
}

/// 类别下标到 (类别标识, 标签) 的固定映射
#[derive(Debug, Clone)]
pub struct ClassLabels {
    entries: Vec<LabelEntry>,
}

impl ClassLabels {
    /// 从文件加载。`.json` 按 Keras `imagenet_class_index.json` 格式解析，
    /// 其余按每行一个标签解析。
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ClassifierError::ModelLoad(format!(
                "Label file not found: {}",
                path.display()
            )));
        }

        tracing::info!("Loading class labels from: {}", path.display());
        let content = std::fs::read_to_string(path)?;

        let labels = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_class_index_json(&content)?,
            _ => Self::from_text(&content)?,
        };

        tracing::info!("Loaded {} class labels", labels.len());
        Ok(labels)
    }

    /// `{"0": ["n01440764", "tench"], "1": [...], ...}`
    pub fn from_class_index_json(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, (String, String)> = serde_json::from_str(content)?;

        let mut indexed = Vec::with_capacity(raw.len());
        for (key, (class_id, label)) in raw {
            let index: usize = key.parse().map_err(|_| {
                ClassifierError::Labels(format!("Class index '{}' is not an integer", key))
            })?;
            indexed.push((index, LabelEntry { class_id, label }));
        }
        indexed.sort_by_key(|(index, _)| *index);

        // 下标必须连续且从0开始
        for (expected, (index, _)) in indexed.iter().enumerate() {
            if *index != expected {
                return Err(ClassifierError::Labels(format!(
                    "Class index {} missing from label table",
                    expected
                )));
            }
        }

        Self::non_empty(indexed.into_iter().map(|(_, entry)| entry).collect())
    }

    /// 每行一个标签，类别标识为行号
    pub fn from_text(content: &str) -> Result<Self> {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| LabelEntry {
                class_id: i.to_string(),
                label: line.to_string(),
            })
            .collect();

        Self::non_empty(entries)
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| LabelEntry {
                class_id: i.to_string(),
                label: name.into(),
            })
            .collect();
        Self { entries }
    }

    fn non_empty(entries: Vec<LabelEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(ClassifierError::Labels("Label table is empty".to_string()));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, index: usize) -> Option<&LabelEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
