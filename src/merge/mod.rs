//! 小说合并向导：选目标 → 预览冲突 → 选择 → 执行。

pub mod novel_list;
pub mod wizard;

pub use novel_list::{NovelOption, load_novel_list, search};
pub use wizard::{MergePlan, Side};
