use super::ValidationError;

/// A chat author profile. The display name may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    id: String,
    name: String,
    profile_image_url: String,
    is_verified: bool,
}

impl Author {
    pub fn new(
        id: String,
        name: String,
        profile_image_url: String,
        is_verified: bool,
    ) -> Result<Self, ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::Empty("id"));
        }

        if profile_image_url.is_empty() {
            return Err(ValidationError::Empty("profile image url"));
        }

        Ok(Self {
            id,
            name,
            profile_image_url,
            is_verified,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile_image_url(&self) -> &str {
        &self.profile_image_url
    }

    pub fn is_verified(&self) -> bool {
        self.is_verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_author() {
        let a = Author::new("a1".into(), "A".into(), "https://example.com/a1.jpg".into(), true)
            .unwrap();

        assert_eq!(a.id(), "a1");
        assert_eq!(a.name(), "A");
        assert!(a.is_verified());
    }

    #[test]
    fn name_may_be_empty() {
        assert!(Author::new("a1".into(), "".into(), "https://example.com/a1.jpg".into(), false)
            .is_ok());
    }

    #[test]
    fn rejects_missing_required_fields() {
        assert_eq!(
            Author::new("".into(), "A".into(), "u".into(), false)
                .unwrap_err()
                .to_string(),
            "id is empty"
        );
        assert_eq!(
            Author::new("a1".into(), "A".into(), "".into(), false)
                .unwrap_err()
                .to_string(),
            "profile image url is empty"
        );
    }
}
