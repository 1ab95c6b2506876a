//! Blend mode presets and their capability gating.

use crate::features::GpuFeatures;
use glint_test_utils::{BlendEquation, BlendFunction};
use wgpu::{BlendFactor, BlendOperation};

/// Predefined ways of combining source and destination colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Standard alpha blending.
    ///
    /// Formula: `src.rgb * src.a + dst.rgb * (1 - src.a)`
    #[default]
    Normal,

    /// Color is multiplied by the destination; alpha blends normally.
    Multiply,

    /// Formula: `src + dst`
    ///
    /// Use for: Glow effects, particles, light sources.
    Add,

    /// Formula: `src - dst`
    Subtract,

    /// Color is added; alpha blends normally.
    AddColor,

    /// Color is subtracted; alpha is inverted.
    SubtractColor,

    /// Formula: `|src - dst|` for opaque sources.
    Difference,

    /// Cuts the source's alpha out of the destination.
    Punchout,

    /// Keeps the destination only where the source is opaque.
    Cutout,
}

/// Device state a [`BlendMode`] resolves to on a given capability set.
///
/// A `None` component is skipped and the device keeps whatever it had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendPlan {
    pub function: Option<BlendFunction>,
    pub equation: Option<BlendEquation>,
    /// Capabilities that were needed but absent.
    pub missing: GpuFeatures,
}

impl BlendPlan {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Whether a component can be set before checking the equation.
enum Gate {
    /// The function is always available; only the equation is gated.
    Function,
    /// Separate factors are required before anything is set.
    Separate,
    /// Blend equations are required before anything is set.
    Equation,
    /// Both must be present before anything is set.
    Both,
}

impl BlendMode {
    fn table(self) -> (BlendFunction, BlendEquation, Gate) {
        use BlendFactor::*;
        match self {
            BlendMode::Normal => (BlendFunction::NORMAL, BlendOperation::Add, Gate::Function),
            BlendMode::Multiply => (
                BlendFunction::separate(Dst, Zero, SrcAlpha, OneMinusSrcAlpha),
                BlendOperation::Add,
                Gate::Separate,
            ),
            BlendMode::Add => (BlendFunction::uniform(One, One), BlendOperation::Add, Gate::Function),
            BlendMode::Subtract => (
                BlendFunction::uniform(One, One),
                BlendOperation::Subtract,
                Gate::Equation,
            ),
            BlendMode::AddColor => (
                BlendFunction::separate(One, One, SrcAlpha, OneMinusSrcAlpha),
                BlendOperation::Add,
                Gate::Separate,
            ),
            BlendMode::SubtractColor => (
                BlendFunction::separate(One, One, OneMinusSrcAlpha, SrcAlpha),
                BlendOperation::Subtract,
                Gate::Both,
            ),
            BlendMode::Difference => (
                BlendFunction::separate(One, One, One, Zero),
                BlendOperation::Subtract,
                Gate::Both,
            ),
            BlendMode::Punchout => (
                BlendFunction::NORMAL,
                BlendOperation::ReverseSubtract,
                Gate::Equation,
            ),
            BlendMode::Cutout => (
                BlendFunction::uniform(OneMinusSrcAlpha, SrcAlpha),
                BlendOperation::ReverseSubtract,
                Gate::Equation,
            ),
        }
    }

    /// Resolve the device calls this mode needs on `features`.
    ///
    /// Components are applied in order (function, then equation) and the
    /// first missing capability stops the rest.
    pub fn plan(self, features: GpuFeatures) -> BlendPlan {
        let (function, equation, gate) = self.table();
        let has_separate = features.contains(GpuFeatures::BLEND_FUNC_SEPARATE);
        let has_equations = features.contains(GpuFeatures::BLEND_EQUATIONS);

        let none = |missing| BlendPlan {
            function: None,
            equation: None,
            missing,
        };

        let function_allowed = match gate {
            Gate::Function => true,
            Gate::Separate => has_separate,
            Gate::Equation => has_equations,
            Gate::Both => has_separate && has_equations,
        };
        if !function_allowed {
            let mut missing = GpuFeatures::empty();
            if matches!(gate, Gate::Separate | Gate::Both) && !has_separate {
                missing |= GpuFeatures::BLEND_FUNC_SEPARATE;
            }
            if matches!(gate, Gate::Both) && has_separate && !has_equations {
                missing |= GpuFeatures::BLEND_EQUATIONS;
            }
            if matches!(gate, Gate::Equation) {
                missing |= GpuFeatures::BLEND_EQUATIONS;
            }
            return none(missing);
        }

        if has_equations {
            BlendPlan {
                function: Some(function),
                equation: Some(equation),
                missing: GpuFeatures::empty(),
            }
        } else {
            BlendPlan {
                function: Some(function),
                equation: None,
                missing: GpuFeatures::BLEND_EQUATIONS,
            }
        }
    }

    /// The full blend state this mode produces when nothing is gated.
    pub fn to_blend_state(self) -> wgpu::BlendState {
        let (function, equation, _) = self.table();
        function.with_equation(equation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: [BlendMode; 9] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Add,
        BlendMode::Subtract,
        BlendMode::AddColor,
        BlendMode::SubtractColor,
        BlendMode::Difference,
        BlendMode::Punchout,
        BlendMode::Cutout,
    ];

    #[test]
    fn test_every_mode_applies_fully_with_all_features() {
        for mode in ALL_MODES {
            let plan = mode.plan(GpuFeatures::all());
            assert!(plan.is_complete(), "{:?}", mode);
            assert!(plan.function.is_some() && plan.equation.is_some());
        }
    }

    #[test]
    fn test_normal_without_equations_sets_function_only() {
        let plan = BlendMode::Normal.plan(GpuFeatures::empty());
        assert_eq!(plan.function, Some(BlendFunction::NORMAL));
        assert_eq!(plan.equation, None);
        assert_eq!(plan.missing, GpuFeatures::BLEND_EQUATIONS);
    }

    #[test]
    fn test_multiply_needs_separate_functions() {
        let plan = BlendMode::Multiply.plan(GpuFeatures::BLEND_EQUATIONS);
        assert_eq!(plan.function, None);
        assert_eq!(plan.equation, None);
        assert_eq!(plan.missing, GpuFeatures::BLEND_FUNC_SEPARATE);

        let plan = BlendMode::Multiply.plan(GpuFeatures::BLEND_FUNC_SEPARATE);
        assert!(plan.function.is_some());
        assert_eq!(plan.equation, None);
    }

    #[test]
    fn test_subtract_is_all_or_nothing() {
        let plan = BlendMode::Subtract.plan(GpuFeatures::BLEND_FUNC_SEPARATE);
        assert_eq!(plan.function, None);
        assert_eq!(plan.missing, GpuFeatures::BLEND_EQUATIONS);

        let plan = BlendMode::Difference.plan(GpuFeatures::BLEND_FUNC_SEPARATE);
        assert_eq!(plan.function, None);
        assert_eq!(plan.missing, GpuFeatures::BLEND_EQUATIONS);
    }

    #[test]
    fn test_cutout_factors() {
        let state = BlendMode::Cutout.to_blend_state();
        assert_eq!(state.color.src_factor, BlendFactor::OneMinusSrcAlpha);
        assert_eq!(state.color.dst_factor, BlendFactor::SrcAlpha);
        assert_eq!(state.color.operation, BlendOperation::ReverseSubtract);
    }

    #[test]
    fn test_default_is_normal() {
        assert_eq!(BlendMode::default(), BlendMode::Normal);
        assert_eq!(
            BlendMode::Normal.to_blend_state().color,
            wgpu::BlendState::ALPHA_BLENDING.color
        );
    }
}
