use teloxide::types::{CallbackQuery, MaybeInaccessibleMessage, Message};
use teloxide::{ApiError, RequestError};

pub trait CallbackQueryExt {
    fn get_message(&self) -> Option<Message>;
}

impl CallbackQueryExt for CallbackQuery {
    fn get_message(&self) -> Option<Message> {
        let Some(MaybeInaccessibleMessage::Regular(message)) = self.message.clone() else {
            return None;
        };

        Some(*message)
    }
}

pub trait ResultExt {
    /// Editing a message to the same content is not a failure
    fn ignore_not_modified(self) -> Result<(), RequestError>;
}

impl<T> ResultExt for Result<T, RequestError> {
    fn ignore_not_modified(self) -> Result<(), RequestError> {
        match self {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_modified_is_fine() {
        let res: Result<(), _> = Err(RequestError::Api(ApiError::MessageNotModified));

        assert!(res.ignore_not_modified().is_ok());
    }

    #[test]
    fn other_errors_stay() {
        let res: Result<(), _> = Err(RequestError::Api(ApiError::MessageToEditNotFound));

        assert!(res.ignore_not_modified().is_err());
    }
}
