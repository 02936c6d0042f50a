use burn::{
  module::{AutodiffModule, ModuleVisitor, Param},
  optim::GradientsParams,
  tensor::{ElementConversion, Tensor, backend::AutodiffBackend},
};

struct SquaredNorm<'a> {
  grads: &'a GradientsParams,
  sum: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_> {
  fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
    if let Some(grad) = self.grads.get::<B::InnerBackend, D>(param.id) {
      self.sum += grad.powi_scalar(2).sum().into_scalar().elem::<f64>();
    }
  }
}

struct Scale<'a> {
  grads: &'a mut GradientsParams,
  factor: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Scale<'_> {
  fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
    if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(param.id) {
      self
        .grads
        .register::<B::InnerBackend, D>(param.id, grad.mul_scalar(self.factor));
    }
  }
}

/// Euclidean norm of all gradients of `module`, taken as one vector.
pub fn global_norm<B: AutodiffBackend, M: AutodiffModule<B>>(module: &M, grads: &GradientsParams) -> f64 {
  let mut visitor = SquaredNorm { grads, sum: 0.0 };
  module.visit(&mut visitor);
  visitor.sum.sqrt()
}

/// Rescales `grads` so their global norm does not exceed `max_norm` and
/// returns the norm before clipping. Non-finite norms are left untouched.
pub fn clip_by_global_norm<B: AutodiffBackend, M: AutodiffModule<B>>(
  module: &M,
  grads: &mut GradientsParams,
  max_norm: f64,
) -> f64 {
  let norm = global_norm(module, grads);
  if norm.is_finite() && norm > max_norm {
    let mut visitor = Scale {
      grads,
      factor: max_norm / norm,
    };
    module.visit(&mut visitor);
  }
  norm
}

#[cfg(test)]
mod tests {
  use super::{clip_by_global_norm, global_norm};
  use crate::{
    architecture::{Architecture, InputShape},
    cnn96::Cnn96,
    layers::Mode,
  };
  use burn::{
    backend::{Autodiff, NdArray, ndarray::NdArrayDevice},
    nn::loss::{MseLoss, Reduction},
    optim::GradientsParams,
    tensor::Tensor,
  };
  use rand::SeedableRng;
  use rand_xoshiro::Xoshiro256PlusPlus;

  const SEED: u64 = 11;
  const CLIP: f64 = 5.0;

  type B = Autodiff<NdArray>;

  fn grads(model: &Cnn96<B>, target: f32) -> GradientsParams {
    let device = NdArrayDevice::Cpu;
    let inputs = Tensor::<B, 4>::ones([4, 1, 8, 8], &device);
    let outputs = model.forward(inputs, Mode::Train { drop_prob: 0.0 });
    let targets = outputs.clone().detach().add_scalar(target);
    let loss = MseLoss::new().forward(outputs, targets, Reduction::Mean);
    GradientsParams::from_grads(loss.backward(), model)
  }

  fn model() -> Cnn96<B> {
    let shape = InputShape {
      channels: 1,
      height: 8,
      width: 8,
    };
    Cnn96::init(shape, &mut Xoshiro256PlusPlus::seed_from_u64(SEED), &NdArrayDevice::Cpu)
  }

  #[test]
  fn large_gradients_are_clipped() {
    let model = model();
    let mut grads = grads(&model, 1000.0);
    let raw = clip_by_global_norm(&model, &mut grads, CLIP);
    assert!(raw > CLIP);
    let applied = global_norm(&model, &grads);
    assert!(applied <= CLIP * (1.0 + 1e-4), "applied norm {applied}");
    assert!((applied - CLIP).abs() < 1e-3 * CLIP);
  }

  #[test]
  fn small_gradients_are_unclipped() {
    let model = model();
    let mut grads = grads(&model, 1e-3);
    let before = global_norm(&model, &grads);
    let raw = clip_by_global_norm(&model, &mut grads, CLIP);
    assert!(raw < CLIP);
    assert_eq!(raw, before);
    assert_eq!(global_norm(&model, &grads), before);
  }
}
