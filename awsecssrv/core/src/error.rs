pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Determines whether the provided error was caused by an `E` typed error.
pub fn is_caused_by<E: std::error::Error + 'static>(
    error: &(dyn std::error::Error + 'static),
) -> bool {
    cause_ref::<E>(error).is_some()
}

/// Finds an `E` typed error in the provided error's sources.
pub fn cause_ref<'e, E: std::error::Error + 'static>(
    mut error: &'e (dyn std::error::Error + 'static),
) -> Option<&'e E> {
    loop {
        if let Some(e) = error.downcast_ref::<E>() {
            return Some(e);
        }
        error = error.source()?;
    }
}
