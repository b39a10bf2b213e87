use serde::{ser::SerializeStruct, Deserialize, Serialize};

use crate::{config::PipelineConfig, error::Result, lexicon::Lexicon, session::Session};

/// Deserialized form of a saved [`Session`].
///
/// Only the configuration and lexicon are stored. Use [`SessionData::into_session`]
/// to get a session back; training data must be passed again to train.
#[derive(Debug, Deserialize)]
pub struct SessionData {
    pub config: PipelineConfig,
    pub lexicon: Option<Lexicon>,
}

impl SessionData {
    /// Revalidate the configuration and the lexicon shape, then rebuild the session.
    pub fn into_session(self) -> Result<Session> {
        let mut session = Session::new(self.config)?;
        if let Some(lexicon) = &self.lexicon {
            lexicon.check_shape()?;
        }
        session.lexicon = self.lexicon;
        Ok(session)
    }
}

impl Serialize for Session {
    /// Serializes the configuration and lexicon, leaving out training and validation data.
    /// Read it back through [`SessionData`].
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("Session", 2)?;
        state.serialize_field("config", &self.config)?;
        state.serialize_field("lexicon", &self.lexicon)?;
        state.end()
    }
}
