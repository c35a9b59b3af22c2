use crate::frame::Frame;
use crate::replication::Role;
use crate::store::Store;

pub trait Executable {
    fn exec(self, store: Store, role: Role) -> Frame;
}
