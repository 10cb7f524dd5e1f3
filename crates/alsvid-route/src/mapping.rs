//! Virtual to real qubit mapping state tracker.

use serde::{Deserialize, Serialize};

/// The state of a real qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QubitState {
    /// No relevant state needing preservation, i.e. garbage.
    None,
    /// Initialized to |0>, suitable for replacing a swap by a move.
    Initialized,
    /// Holds a unique state which must be preserved.
    Live,
}

impl std::fmt::Display for QubitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QubitState::None => write!(f, "none"),
            QubitState::Initialized => write!(f, "initialized"),
            QubitState::Live => write!(f, "live"),
        }
    }
}

/// Virtual to real qubit mapping. Maintains the partial permutation (and
/// its inverse on demand) together with the liveness state of each real
/// qubit.
///
/// Invariant: the map is injective on its defined domain; no two virtual
/// qubits share a real qubit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QubitMapping {
    /// Real index for each virtual qubit, if mapped.
    virt_to_real: Vec<Option<u32>>,
    /// State of each real qubit.
    real_state: Vec<QubitState>,
}

impl QubitMapping {
    /// Create a mapping for `num_qubits` qubits.
    ///
    /// The map starts undefined for all virtual qubits unless `one_to_one`
    /// is set, in which case virtual qubit i maps to real qubit i. All real
    /// qubits start in `initial_state`.
    pub fn new(num_qubits: u32, one_to_one: bool, initial_state: QubitState) -> Self {
        let n = num_qubits as usize;
        Self {
            virt_to_real: if one_to_one {
                (0..num_qubits).map(Some).collect()
            } else {
                vec![None; n]
            },
            real_state: vec![initial_state; n],
        }
    }

    /// Number of qubits in the map.
    pub fn num_qubits(&self) -> u32 {
        self.virt_to_real.len() as u32
    }

    /// Real qubit the given virtual qubit lives on, if mapped.
    #[inline]
    pub fn real(&self, virt: u32) -> Option<u32> {
        self.virt_to_real[virt as usize]
    }

    /// Virtual qubit living on the given real qubit, if any (backward map).
    pub fn virt(&self, real: u32) -> Option<u32> {
        self.virt_to_real
            .iter()
            .position(|&r| r == Some(real))
            .map(|v| v as u32)
    }

    /// The underlying virtual-to-real vector.
    pub fn virt_to_real(&self) -> &[Option<u32>] {
        &self.virt_to_real
    }

    /// State of the given real qubit.
    #[inline]
    pub fn state(&self, real: u32) -> QubitState {
        self.real_state[real as usize]
    }

    /// Overwrite the state of the given real qubit.
    #[inline]
    pub fn set_state(&mut self, real: u32, state: QubitState) {
        self.real_state[real as usize] = state;
    }

    /// Record an externally computed mapping for a virtual qubit.
    ///
    /// # Panics
    ///
    /// Panics if the real qubit already hosts another virtual qubit.
    pub fn assign(&mut self, virt: u32, real: u32) {
        assert!(
            self.virt(real).map_or(true, |v| v == virt),
            "real qubit {real} already hosts another virtual qubit"
        );
        self.virt_to_real[virt as usize] = Some(real);
    }

    /// Allocate a real qubit for an unmapped virtual qubit: the
    /// lowest-indexed real qubit not in the image of the map.
    ///
    /// # Panics
    ///
    /// Panics if the virtual qubit is already mapped (internal-consistency
    /// error) or all real qubits are in use (cannot happen: the map is
    /// square).
    pub fn allocate(&mut self, virt: u32) -> u32 {
        assert!(
            self.virt_to_real[virt as usize].is_none(),
            "virtual qubit {virt} is already mapped"
        );
        for real in 0..self.num_qubits() {
            if self.virt(real).is_none() {
                debug_assert!(self.real_state[real as usize] != QubitState::Live);
                self.virt_to_real[virt as usize] = Some(real);
                return real;
            }
        }
        unreachable!("as many real as virtual qubits, so a free real always exists");
    }

    /// Update the map to reflect a swap of two real qubits: the virtuals
    /// previously living on `r0`/`r1` (if any) move to the other, and the
    /// states interchange.
    ///
    /// # Panics
    ///
    /// Panics if `r0 == r1`.
    pub fn swap(&mut self, r0: u32, r1: u32) {
        assert!(r0 != r1, "swap on equal real qubits {r0}");
        let v0 = self.virt(r0);
        let v1 = self.virt(r1);

        if let Some(v0) = v0 {
            self.virt_to_real[v0 as usize] = Some(r1);
        } else {
            debug_assert!(self.real_state[r0 as usize] != QubitState::Live);
        }
        if let Some(v1) = v1 {
            self.virt_to_real[v1 as usize] = Some(r0);
        } else {
            debug_assert!(self.real_state[r1 as usize] != QubitState::Live);
        }

        self.real_state.swap(r0 as usize, r1 as usize);
    }

    /// Check that the map is injective on its defined domain.
    pub fn is_valid_partial_permutation(&self) -> bool {
        let mut seen = vec![false; self.virt_to_real.len()];
        for &r in &self.virt_to_real {
            if let Some(r) = r {
                let Some(slot) = seen.get_mut(r as usize) else {
                    return false;
                };
                if *slot {
                    return false;
                }
                *slot = true;
            }
        }
        true
    }
}

impl std::fmt::Display for QubitMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut any = false;
        for (v, r) in self.virt_to_real.iter().enumerate() {
            if let Some(r) = r {
                if any {
                    write!(f, ", ")?;
                }
                write!(f, "{v} => {r}")?;
                any = true;
            }
        }
        if !any {
            write!(f, "empty")?;
        }
        Ok(())
    }
}
