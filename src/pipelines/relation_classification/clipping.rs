use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};

/// Keeps the clip coefficient finite when the gradients vanish
const NORM_EPS: f64 = 1e-6;

/// Sums the squared gradient of every float parameter
struct SquaredNorm<'a> {
    grads: &'a GradientsParams,
    total: f64,
}

impl<'a, B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'a> {
    fn visit_float<const D: usize>(&mut self, id: &ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.total += grad.clone().mul(grad).sum().into_scalar().elem::<f64>();
        }
    }
}

/// Multiplies every float parameter gradient by the same factor
struct Scale<'a> {
    grads: &'a mut GradientsParams,
    factor: f64,
}

impl<'a, B: AutodiffBackend> ModuleVisitor<B> for Scale<'a> {
    fn visit_float<const D: usize>(&mut self, id: &ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads
                .register::<B::InnerBackend, D>(id.clone(), grad.mul_scalar(self.factor));
        }
    }
}

/// The L2 norm of all gradients of the module taken together
pub fn global_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm { grads, total: 0.0 };
    module.visit(&mut visitor);

    visitor.total.sqrt()
}

/// Rescale the gradients so their global L2 norm is at most `max_norm`, returning the norm
/// measured before clipping. A `max_norm` of 0 or less disables clipping.
pub fn clip_grad_norm<B, M>(module: &M, grads: &mut GradientsParams, max_norm: f32) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_norm::<B, M>(module, grads);

    let max_norm = max_norm as f64;
    let coefficient = max_norm / (norm + NORM_EPS);

    if max_norm > 0.0 && coefficient < 1.0 {
        let mut visitor = Scale {
            grads,
            factor: coefficient,
        };
        module.visit(&mut visitor);
    }

    norm
}
