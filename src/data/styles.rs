//! 风格（personality）词表：风格名 <-> 类别 id，id 0 保留给未知风格

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::error::DataError;

pub const UNK_STYLE: &str = "<unk-style>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct StyleVocabulary {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl From<Vec<String>> for StyleVocabulary {
    fn from(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self { names, index }
    }
}

impl From<StyleVocabulary> for Vec<String> {
    fn from(styles: StyleVocabulary) -> Self {
        styles.names
    }
}

impl StyleVocabulary {
    /// 按首次出现顺序收录风格名（去重、去首尾空白、跳过空行）
    pub fn fit<I, S>(styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = vec![UNK_STYLE.to_string()];
        for style in styles {
            let style = style.as_ref().trim();
            if !style.is_empty() && !names.iter().any(|n| n == style) {
                names.push(style.to_string());
            }
        }
        Self::from(names)
    }

    /// 从每行一个风格名的文本文件读取（文件顺序）
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::fit(content.lines()))
    }

    /// 风格名 -> id，未知风格为 0
    pub fn id(&self, style: &str) -> usize {
        self.index.get(style.trim()).copied().unwrap_or(0)
    }

    pub fn name(&self, id: usize) -> &str {
        self.names.get(id).map_or(UNK_STYLE, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
