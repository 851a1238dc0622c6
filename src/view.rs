use crate::stream::Observable;

/// Capability of an object that owns a displayable view.
///
/// The runtime only needs to know when the view has left the screen; it
/// never renders or inspects it.
pub trait ViewControllable: Send + Sync + 'static {
    /// Emits each time the view disappears.
    fn did_disappear(&self) -> Observable<()>;

    /// Description used in leak reports.
    fn description(&self) -> String {
        std::any::type_name::<Self>().to_owned()
    }
}
