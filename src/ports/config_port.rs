//! Configuration access port.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// `Ok(None)` when the key is absent; `Err` carries the raw text when it
    /// is present but not an integer.
    fn try_get_int(&self, section: &str, key: &str) -> Result<Option<i64>, String> {
        match self.get_string(section, key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| raw),
        }
    }

    fn try_get_double(&self, section: &str, key: &str) -> Result<Option<f64>, String> {
        match self.get_string(section, key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| raw),
        }
    }

    /// Comma-separated value split into trimmed, non-empty items.
    fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.get_string(section, key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}
