//! 角色词表（Glossary）数据模型。
//!
//! 词表是 `角色 id → 角色条目` 的映射，保持文档中的插入顺序：
//! 高亮时同长度名字的先后完全取决于这个顺序。

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gender {
    #[default]
    Auto,
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Auto => "auto",
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    /// 未知取值一律按 `auto` 处理。
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            "other" => Gender::Other,
            _ => Gender::Auto,
        }
    }

    /// 角色详情弹窗中的性别标签；`auto` 不显示。
    pub fn popup_label(self) -> Option<&'static str> {
        match self {
            Gender::Auto => None,
            Gender::Male => Some("Male (he/him)"),
            Gender::Female => Some("Female (she/her)"),
            Gender::Other => Some("Other (they/them)"),
        }
    }

    /// 词表编辑器摘要行里的徽章文字。
    pub fn badge_text(self) -> &'static str {
        match self {
            Gender::Auto => "AI Auto-select",
            Gender::Male => "he/him",
            Gender::Female => "she/her",
            Gender::Other => "they/them",
        }
    }

    pub fn css_class(self) -> String {
        format!("gender-{}", self.as_str())
    }
}

impl Serialize for Gender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| Gender::parse(&s)).unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharacterEntry {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub korean_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub english_name: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

impl CharacterEntry {
    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }

    /// 参与高亮的条件：有译名且有描述。
    pub fn is_highlightable(&self) -> bool {
        self.has_description() && !self.english_name.trim().is_empty()
    }

    /// 显示名：优先译名，其次原名。
    pub fn display_name(&self) -> &str {
        if self.english_name.is_empty() {
            &self.korean_name
        } else {
            &self.english_name
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// 有序的角色词表。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Glossary {
    entries: Vec<(String, CharacterEntry)>,
}

impl Glossary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: &str) -> Option<&CharacterEntry> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    /// 已存在的 id 原位替换，不改变顺序。
    pub fn insert(&mut self, id: impl Into<String>, entry: CharacterEntry) {
        let id = id.into();
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((id, entry)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CharacterEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, CharacterEntry)> for Glossary {
    fn from_iter<I: IntoIterator<Item = (String, CharacterEntry)>>(iter: I) -> Self {
        let mut g = Glossary::new();
        for (id, entry) in iter {
            g.insert(id, entry);
        }
        g
    }
}

impl Serialize for Glossary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, entry) in &self.entries {
            map.serialize_entry(id, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Glossary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GlossaryVisitor;

        impl<'de> Visitor<'de> for GlossaryVisitor {
            type Value = Glossary;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of character id to character entry")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Glossary, E> {
                Ok(Glossary::new())
            }

            fn visit_none<E: serde::de::Error>(self) -> Result<Glossary, E> {
                Ok(Glossary::new())
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Glossary, D::Error> {
                d.deserialize_any(GlossaryVisitor)
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Glossary, A::Error> {
                let mut g = Glossary::new();
                while let Some((id, entry)) = access.next_entry::<String, CharacterEntry>()? {
                    g.insert(id, entry);
                }
                Ok(g)
            }
        }

        deserializer.deserialize_option(GlossaryVisitor)
    }
}
