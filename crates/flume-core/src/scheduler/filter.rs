/// Device allow-list parsed from a comma-separated id list. An empty list
/// allows every device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    ids: Vec<String>,
}

impl DeviceFilter {
    pub fn parse(raw: &str) -> Self {
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        Self { ids }
    }

    pub fn allows(&self, device_id: &str) -> bool {
        self.ids.is_empty() || self.ids.iter().any(|id| id == device_id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}
