//! `StateInit` construction and the address derivation that follows from it.
//!
//! A contract's address is fixed before deployment: it is the representation
//! hash of the `StateInit` cell holding exactly the code and data that will
//! be deployed, scoped to a workchain.

use {
    crate::{
        address::Address,
        cell::{Cell, CellBuilder, CellError},
    },
    std::sync::Arc,
};

/// Builds the `StateInit` cell for the given code and data.
///
/// No split depth, no special markers, no libraries; plain code plus data,
/// which is what ordinary contracts deploy with.
pub fn state_init(code: Arc<Cell>, data: Arc<Cell>) -> Result<Cell, CellError> {
    let mut builder = CellBuilder::new();
    builder.store_uint(0b00110, 5)?;
    builder.store_reference(code)?;
    builder.store_reference(data)?;
    builder.build()
}

/// Derives the deterministic deployment address of a contract from the
/// workchain and the exact (code, data) pair that will be deployed.
pub fn contract_address(
    workchain: i32,
    code: &Arc<Cell>,
    data: &Arc<Cell>,
) -> Result<Address, CellError> {
    let init = state_init(code.clone(), data.clone())?;
    Ok(Address::new(workchain, init.repr_hash()))
}
