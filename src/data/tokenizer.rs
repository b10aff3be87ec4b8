/*
 * @Date         : 2026-02-06
 * @Description  : 描述文本分词器与词表
 *
 * 词表布局：`<pad>`=0，`<unk>`=1，然后是按词频降序（同频按首次出现顺序）排列的词，
 * 最后依次为`<end>`与`<start>`。词表总大小（含上述4个特殊符号）不超过上限。
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::error::DataError;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const END_TOKEN: &str = "<end>";
pub const START_TOKEN: &str = "<start>";

pub const PAD_ID: usize = 0;
pub const UNK_ID: usize = 1;

/// 特殊符号个数
const NUM_SPECIAL: usize = 4;

/// 与 Keras Tokenizer 默认相同的过滤字符
const FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// 拟合好的词表，不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    words: Vec<String>,
    index: HashMap<String, usize>,
}

impl From<Vec<String>> for Vocabulary {
    fn from(words: Vec<String>) -> Self {
        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Self { words, index }
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.words
    }
}

impl Vocabulary {
    /// 由（已按频次排好序的）普通词构造完整词表
    fn with_words<I: IntoIterator<Item = String>>(words: I) -> Self {
        let all: Vec<String> = [PAD_TOKEN, UNK_TOKEN]
            .into_iter()
            .map(str::to_string)
            .chain(words)
            .chain([END_TOKEN, START_TOKEN].into_iter().map(str::to_string))
            .collect();
        Self::from(all)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn id(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn word(&self, id: usize) -> Option<&str> {
        self.words.get(id).map(String::as_str)
    }

    pub fn end_id(&self) -> usize {
        self.words.len() - 2
    }

    pub fn start_id(&self) -> usize {
        self.words.len() - 1
    }

    /// 特殊符号是否位于约定的位置
    fn check_layout(&self) -> Result<(), String> {
        if self.words.len() < NUM_SPECIAL {
            return Err(format!(
                "只有 {} 个符号，至少需要 {NUM_SPECIAL} 个特殊符号",
                self.words.len()
            ));
        }
        let expected = [
            (PAD_ID, PAD_TOKEN),
            (UNK_ID, UNK_TOKEN),
            (self.end_id(), END_TOKEN),
            (self.start_id(), START_TOKEN),
        ];
        for (id, token) in expected {
            if self.words[id] != token {
                return Err(format!("第{id}位应为{token}，实际为{}", self.words[id]));
            }
        }
        if self.index.len() != self.words.len() {
            return Err("存在重复的词".to_string());
        }
        Ok(())
    }
}

/// 小写化、过滤标点、按空白切分
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if FILTERS.contains(c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// 描述文本分词器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokenizer {
    /// 词表大小上限（含特殊符号）
    max_vocab_size: usize,
    vocab: Option<Vocabulary>,
}

impl Tokenizer {
    pub const fn new(max_vocab_size: usize) -> Self {
        Self {
            max_vocab_size,
            vocab: None,
        }
    }

    /// 由语料拟合词表。相同语料多次拟合结果相同，再次拟合会替换旧词表
    pub fn fit<I, S>(&mut self, corpus: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for text in corpus {
            for word in tokenize(text.as_ref()) {
                let first_seen = counts.len();
                counts.entry(word).or_insert((0, first_seen)).0 += 1;
            }
        }

        let mut ranked: Vec<(String, usize, usize)> = counts
            .into_iter()
            .map(|(word, (count, first_seen))| (word, count, first_seen))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        let capacity = self.max_vocab_size.saturating_sub(NUM_SPECIAL);
        let words = ranked
            .into_iter()
            .map(|(word, _, _)| word)
            .filter(|w| ![PAD_TOKEN, UNK_TOKEN, END_TOKEN, START_TOKEN].contains(&w.as_str()))
            .take(capacity);
        self.vocab = Some(Vocabulary::with_words(words));
    }

    pub fn vocabulary(&self) -> Result<&Vocabulary, DataError> {
        self.vocab.as_ref().ok_or(DataError::NotFitted)
    }

    /// 文本 -> id 序列，不在词表中的词映射为`<unk>`
    pub fn encode(&self, text: &str) -> Result<Vec<usize>, DataError> {
        let vocab = self.vocabulary()?;
        Ok(tokenize(text)
            .iter()
            .map(|w| vocab.id(w).unwrap_or(UNK_ID))
            .collect())
    }

    /// id 序列 -> 文本：跳过`<pad>`与`<start>`，遇到`<end>`停止
    pub fn decode(&self, ids: &[usize]) -> Result<String, DataError> {
        let vocab = self.vocabulary()?;
        let words: Vec<&str> = ids
            .iter()
            .take_while(|&&id| id != vocab.end_id())
            .filter(|&&id| id != PAD_ID && id != vocab.start_id())
            .map(|&id| vocab.word(id).unwrap_or(UNK_TOKEN))
            .collect();
        Ok(words.join(" "))
    }

    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// 读取保存的分词器；已拟合的词表须以`<pad>`、`<unk>`开头，以`<end>`、`<start>`结尾
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let tokenizer: Self = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        if let Some(vocab) = &tokenizer.vocab {
            vocab
                .check_layout()
                .map_err(|reason| DataError::InvalidVocabulary {
                    path: path.to_path_buf(),
                    reason,
                })?;
        }
        Ok(tokenizer)
    }
}
