use serde::{Deserialize, Serialize};

/// # Summary
/// 聊天频道引用 (Discord channel id)。私信频道也以此表示。
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChannelRef(pub String);

/// # Summary
/// 已发送消息的引用 (Discord message id)，用于后续编辑。
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageRef(pub String);

/// # Summary
/// 卡片上的一个字段 (Discord embed field)。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// # Summary
/// 发往聊天界面的信号卡片：标题、着色、字段与可选的三个互斥动作
/// (Confirm / Reject / Details)。动作的 custom_id 携带信号标识。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCard {
    /// 动作按钮所绑定的信号 id；None 表示纯展示卡片
    pub signal_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// 24-bit RGB
    pub color: u32,
    pub fields: Vec<CardField>,
    pub footer: Option<String>,
    /// 是否携带 Confirm / Reject / Details 动作
    pub with_actions: bool,
}

/// # Summary
/// 对已渲染卡片的终态改写：替换标题与颜色并摘除动作。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardUpdate {
    pub title: String,
    pub color: u32,
}

/// # Summary
/// 卡片动作种类，与按钮 custom_id 前缀一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    Confirm,
    Reject,
    Details,
}

impl CardAction {
    /// 从按钮 custom_id 前缀解析。
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "confirm" => Some(CardAction::Confirm),
            "reject" => Some(CardAction::Reject),
            "details" => Some(CardAction::Details),
            _ => None,
        }
    }
}

/// # Summary
/// 聊天平台上行事件：由网关连接解码后投递给桥接逻辑。
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// 文本命令 (例如 `!signals`)
    Command {
        discord_user_id: String,
        channel_id: ChannelRef,
        command: String,
        args: Vec<String>,
    },
    /// 卡片按钮点击
    Action {
        discord_user_id: String,
        interaction_id: String,
        interaction_token: String,
        channel_id: ChannelRef,
        message_id: MessageRef,
        action: CardAction,
        signal_id: String,
    },
}
