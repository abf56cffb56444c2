//! The seam between the reconciler and whatever host tree it drives.

use std::fmt::Debug;

use crate::element::Props;
use crate::fiber::FiberId;

/// Host tree adapter.
///
/// The reconciler never touches host instances except through these calls.
/// Instances are handles owned by the host; fibers only keep clones of them.
pub trait HostConfig: 'static {
    type Instance: Clone + PartialEq + Debug + 'static;
    type UpdatePayload: Clone + Debug + 'static;

    fn create_instance(&mut self, ty: &str, props: &Props, owner: FiberId) -> Self::Instance;

    fn create_text_instance(&mut self, text: &str, owner: FiberId) -> Self::Instance;

    fn append_initial_child(&mut self, parent: &Self::Instance, child: &Self::Instance);

    fn append_child(&mut self, parent: &Self::Instance, child: &Self::Instance);

    fn insert_before(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
        before: &Self::Instance,
    );

    fn remove_child(&mut self, parent: &Self::Instance, child: &Self::Instance);

    /// Applies the initial props. Returns `true` when the node needs an
    /// `UPDATE` commit after it is mounted (focus handling and the like).
    fn finalize_initial_properties(
        &mut self,
        instance: &Self::Instance,
        ty: &str,
        props: &Props,
    ) -> bool;

    /// Called during commit for a freshly mounted node whose
    /// `finalize_initial_properties` returned `true`.
    fn commit_mount(&mut self, _instance: &Self::Instance, _ty: &str, _props: &Props) {}

    fn diff_properties(
        &mut self,
        instance: &Self::Instance,
        ty: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Option<Self::UpdatePayload>;

    fn apply_update_payload(
        &mut self,
        instance: &Self::Instance,
        payload: Self::UpdatePayload,
        ty: &str,
        old_props: &Props,
        new_props: &Props,
    );

    fn commit_text_update(&mut self, instance: &Self::Instance, old_text: &str, new_text: &str);

    fn reset_text_content(&mut self, instance: &Self::Instance);

    /// When true the host owns `props.children` as text and no child fiber
    /// is created for it.
    fn should_treat_children_as_text(&self, ty: &str, props: &Props) -> bool;
}
