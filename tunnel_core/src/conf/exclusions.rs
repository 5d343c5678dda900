use serde::{Deserialize, Serialize};

/// Application ids excluded from every tunnel.
///
/// Merged into each interface's own exclusion list when a snapshot is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalExclusions(Vec<String>);

impl GlobalExclusions {
    pub fn new<I, S>(applications: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Vec::new();
        for application in applications {
            let application = application.into();
            if !application.is_empty() && !list.contains(&application) {
                list.push(application);
            }
        }
        GlobalExclusions(list)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Append every global entry missing from `applications`, keeping order.
    pub fn merge_into(&self, applications: &mut Vec<String>) {
        for application in &self.0 {
            if !applications.contains(application) {
                applications.push(application.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_drops_duplicates_and_blanks() {
        let globals = GlobalExclusions::new(["com.a", "", "com.b", "com.a"]);
        assert_eq!(globals.iter().collect::<Vec<_>>(), vec!["com.a", "com.b"]);
    }

    #[test]
    fn test_merge_into_appends_missing() {
        let globals = GlobalExclusions::new(["com.a", "com.b"]);
        let mut apps = vec!["com.b".to_string(), "com.c".to_string()];
        globals.merge_into(&mut apps);
        assert_eq!(apps, vec!["com.b", "com.c", "com.a"]);
    }
}
