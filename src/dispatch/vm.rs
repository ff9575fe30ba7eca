//! Entry points called from the script VM.
//!
//! `params` are the raw argument cells of a native call, without the VM's
//! leading byte-count cell.

use tracing::warn;

use crate::bus::EventBus;
use crate::codec::ArgPassing;
use crate::vm::{Cell, VmMemory};

fn read_name(bus: &EventBus, memory: &dyn VmMemory, addr: Cell) -> Option<String> {
    match memory.read_string(addr, bus.config().max_string_len) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            warn!(error = %err, "Can't read event name from VM memory");
            None
        }
    }
}

/// `RegisterEvent(const name[], const paramTypes[])`
pub fn register_event(bus: &EventBus, memory: &dyn VmMemory, params: &[Cell]) -> bool {
    let [name, types, ..] = params else {
        return false;
    };
    let Some(name) = read_name(bus, memory, *name) else {
        return false;
    };
    let Some(types) = read_name(bus, memory, *types) else {
        return false;
    };
    bus.register_event(&name, &types)
}

/// `CallEvent(const name[], {Float,_}:...)`: the event name followed by the
/// event's arguments, each passed by reference.
pub fn call_event(bus: &EventBus, memory: &dyn VmMemory, params: &[Cell]) -> Cell {
    let Some((&name, cells)) = params.split_first() else {
        return 0;
    };
    let Some(name) = read_name(bus, memory, name) else {
        return 0;
    };
    bus.dispatch_from_vm(&name, memory, cells, ArgPassing::ByReference)
        .map_or(0, |report| report.result)
}

/// VM-to-engine dispatch with arguments passed by value, as a public
/// callback receives them.
pub fn dispatch(bus: &EventBus, name: &str, memory: &dyn VmMemory, cells: &[Cell]) -> Cell {
    bus.dispatch_from_vm(name, memory, cells, ArgPassing::ByValue)
        .map_or(0, |report| report.result)
}
