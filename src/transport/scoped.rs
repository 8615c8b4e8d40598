use std::ops::{Deref, DerefMut};

use super::{Transport, TransportError};

/// An open transport that is closed when the guard goes out of scope,
/// on every exit path including early returns and `?`.
pub struct ScopedConnection<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> ScopedConnection<'a, T> {
    pub async fn open(transport: &'a mut T) -> Result<Self, TransportError> {
        transport.open().await?;
        Ok(Self { transport })
    }
}

impl<T: Transport + ?Sized> Deref for ScopedConnection<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.transport
    }
}

impl<T: Transport + ?Sized> DerefMut for ScopedConnection<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.transport
    }
}

impl<T: Transport + ?Sized> Drop for ScopedConnection<'_, T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}
