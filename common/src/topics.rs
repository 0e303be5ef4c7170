pub const LEAF_CMD_CONNECT: &str = "cmnd/connect";
pub const LEAF_CMD_FIND: &str = "cmnd/find";
pub const LEAF_CMD_GET: &str = "cmnd/get";
pub const LEAF_CMD_SET: &str = "cmnd/set";

pub const LEAF_DPS: &str = "dps";
pub const LEAF_ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    pub connect: String,
    pub find: String,
    pub get: String,
    pub set: String,
    pub dps: String,
    pub error: String,
}

impl DeviceTopics {
    pub fn new(prefix: &str, device_id: &str) -> Self {
        let topic = |leaf: &str| format!("{prefix}/{device_id}/{leaf}");
        Self {
            connect: topic(LEAF_CMD_CONNECT),
            find: topic(LEAF_CMD_FIND),
            get: topic(LEAF_CMD_GET),
            set: topic(LEAF_CMD_SET),
            dps: topic(LEAF_DPS),
            error: topic(LEAF_ERROR),
        }
    }

    pub fn wildcard(prefix: &str) -> [String; 2] {
        [
            format!("{prefix}/+/{LEAF_DPS}"),
            format!("{prefix}/+/{LEAF_ERROR}"),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    DataPoints,
    Error,
}

pub fn parse_inbound<'a>(prefix: &str, topic: &'a str) -> Option<(&'a str, InboundKind)> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let (device_id, leaf) = rest.split_once('/')?;
    if device_id.is_empty() {
        return None;
    }
    let kind = match leaf {
        LEAF_DPS => InboundKind::DataPoints,
        LEAF_ERROR => InboundKind::Error,
        _ => return None,
    };
    Some((device_id, kind))
}
